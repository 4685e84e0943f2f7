// provis-common/src/model/profile.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentKey};

/// Reserved alias for "the profile of the running installation".
pub const SELF_PROFILE: &str = "_SELF_";
/// Per-component property marking a component the user asked for explicitly.
pub const PROP_ROOT: &str = "provis.type.root";
/// Per-component property holding the inclusion rule of a root.
pub const PROP_INCLUSION_RULES: &str = "provis.inclusion.rules";
pub const INCLUSION_STRICT: &str = "STRICT";
pub const INCLUSION_OPTIONAL: &str = "OPTIONAL";

/// A read-only snapshot of one installed state.
///
/// Profiles are never mutated by the resolver; a new revision with a new
/// timestamp is produced by whoever applies a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    id: String,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    installed: BTreeSet<Arc<Component>>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    component_properties: BTreeMap<ComponentKey, BTreeMap<String, String>>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_installed<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = Arc<Component>>,
    {
        self.installed.extend(components);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_component_property(
        mut self,
        component: &ComponentKey,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.component_properties
            .entry(component.clone())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Marks `component` as a root with the given inclusion rule.
    pub fn with_root(self, component: &ComponentKey, strict: bool) -> Self {
        let rule = if strict {
            INCLUSION_STRICT
        } else {
            INCLUSION_OPTIONAL
        };
        self.with_component_property(component, PROP_ROOT, "true")
            .with_component_property(component, PROP_INCLUSION_RULES, rule)
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Milliseconds since the UNIX epoch at which this revision was recorded.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn installed(&self) -> &BTreeSet<Arc<Component>> {
        &self.installed
    }

    pub fn is_installed(&self, key: &ComponentKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &ComponentKey) -> Option<&Arc<Component>> {
        self.installed.get(key)
    }

    pub fn installed_with_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Arc<Component>> {
        self.installed.iter().filter(move |c| c.id() == id)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn component_properties(&self, component: &ComponentKey) -> Option<&BTreeMap<String, String>> {
        self.component_properties.get(component)
    }

    pub fn component_property(&self, component: &ComponentKey, key: &str) -> Option<&str> {
        self.component_properties
            .get(component)
            .and_then(|props| props.get(key))
            .map(String::as_str)
    }

    /// Whether any installed component carries a root marker.
    pub fn has_root_markers(&self) -> bool {
        self.installed
            .iter()
            .any(|c| self.component_property(c.key(), PROP_ROOT) == Some("true"))
    }

    pub fn is_root(&self, component: &ComponentKey) -> bool {
        if !self.has_root_markers() {
            return self.is_installed(component);
        }
        self.component_property(component, PROP_ROOT) == Some("true")
    }

    /// Installed roots. Without any root markers every installed component is a root.
    pub fn roots(&self) -> Vec<Arc<Component>> {
        let marked = self.has_root_markers();
        self.installed
            .iter()
            .filter(|c| !marked || self.component_property(c.key(), PROP_ROOT) == Some("true"))
            .cloned()
            .collect()
    }

    /// Roots are strict unless their inclusion rule says otherwise.
    pub fn is_strict(&self, component: &ComponentKey) -> bool {
        self.component_property(component, PROP_INCLUSION_RULES) != Some(INCLUSION_OPTIONAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Version;

    fn component(id: &str) -> Arc<Component> {
        Component::builder(id, Version::new(1, 0, 0)).build()
    }

    #[test]
    fn unmarked_profile_treats_everything_as_root() {
        let profile = Profile::new("p").with_installed([component("a"), component("b")]);
        assert_eq!(profile.roots().len(), 2);
        assert!(profile.is_root(component("b").key()));
    }

    #[test]
    fn lookup_by_key_picks_the_exact_version() {
        let old = Component::builder("lib", Version::new(1, 0, 0)).multi_version().build();
        let new = Component::builder("lib", Version::new(2, 0, 0)).multi_version().build();
        let profile = Profile::new("p").with_installed([component("a"), old.clone(), new.clone()]);
        assert_eq!(profile.get(new.key()), Some(&new));
        assert_eq!(profile.get(old.key()), Some(&old));
        assert!(!profile.is_installed(&ComponentKey::new("lib", Version::new(3, 0, 0))));
    }

    #[test]
    fn root_markers_restrict_roots() {
        let a = component("a");
        let profile = Profile::new("p")
            .with_installed([a.clone(), component("b")])
            .with_root(a.key(), false);
        let roots = profile.roots();
        assert_eq!(roots, vec![a.clone()]);
        assert!(!profile.is_root(component("b").key()));
        assert!(!profile.is_strict(a.key()));
        assert!(profile.is_strict(component("b").key()));
    }
}
