// provis-common/src/model/request.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::capability::Requirement;
use super::component::{Component, ComponentKey};
use super::profile::{INCLUSION_OPTIONAL, INCLUSION_STRICT, PROP_INCLUSION_RULES};

/// The desired delta against one profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChangeRequest {
    pub profile_id: String,
    pub to_add: BTreeSet<Arc<Component>>,
    pub to_remove: BTreeSet<Arc<Component>>,
    pub property_adds: BTreeMap<String, String>,
    pub property_removes: BTreeSet<String>,
    pub component_property_adds: BTreeMap<ComponentKey, BTreeMap<String, String>>,
    pub component_property_removes: BTreeMap<ComponentKey, BTreeSet<String>>,
    /// Requirements injected directly into resolution, independent of any root.
    pub extra_requirements: BTreeSet<Requirement>,
}

impl ProfileChangeRequest {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, component: Arc<Component>) {
        self.to_add.insert(component);
    }

    pub fn add_all<I: IntoIterator<Item = Arc<Component>>>(&mut self, components: I) {
        self.to_add.extend(components);
    }

    pub fn remove(&mut self, component: Arc<Component>) {
        self.to_remove.insert(component);
    }

    pub fn remove_all<I: IntoIterator<Item = Arc<Component>>>(&mut self, components: I) {
        self.to_remove.extend(components);
    }

    pub fn set_profile_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.property_removes.remove(&key);
        self.property_adds.insert(key, value.into());
    }

    pub fn remove_profile_property(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.property_adds.remove(&key);
        self.property_removes.insert(key);
    }

    pub fn set_component_property(
        &mut self,
        component: &ComponentKey,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let key = key.into();
        if let Some(removes) = self.component_property_removes.get_mut(component) {
            removes.remove(&key);
        }
        self.component_property_adds
            .entry(component.clone())
            .or_default()
            .insert(key, value.into());
    }

    pub fn remove_component_property(&mut self, component: &ComponentKey, key: impl Into<String>) {
        let key = key.into();
        if let Some(adds) = self.component_property_adds.get_mut(component) {
            adds.remove(&key);
        }
        self.component_property_removes
            .entry(component.clone())
            .or_default()
            .insert(key);
    }

    /// The component may be left out if it cannot be installed.
    pub fn set_inclusion_optional(&mut self, component: &ComponentKey) {
        self.set_component_property(component, PROP_INCLUSION_RULES, INCLUSION_OPTIONAL);
    }

    pub fn set_inclusion_strict(&mut self, component: &ComponentKey) {
        self.set_component_property(component, PROP_INCLUSION_RULES, INCLUSION_STRICT);
    }

    pub fn is_optional_inclusion(&self, component: &ComponentKey) -> bool {
        self.component_property_adds
            .get(component)
            .and_then(|props| props.get(PROP_INCLUSION_RULES))
            .is_some_and(|rule| rule == INCLUSION_OPTIONAL)
    }

    pub fn add_extra_requirement(&mut self, requirement: Requirement) {
        self.extra_requirements.insert(requirement);
    }

    /// True when the request changes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_remove.is_empty()
            && self.property_adds.is_empty()
            && self.property_removes.is_empty()
            && self.component_property_adds.is_empty()
            && self.component_property_removes.is_empty()
            && self.extra_requirements.is_empty()
    }
}
