// Shared fixtures for the provis-core integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use provis_common::model::component::ComponentBuilder;
use provis_common::{
    Catalog, Component, ComponentKey, Operand, Profile, PropertyOperand, ProvisioningPlan,
    Version, VersionRange,
};
use provis_core::{Planner, PlannerOptions};

pub fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

pub fn range(s: &str) -> VersionRange {
    VersionRange::parse(s).unwrap()
}

pub fn key(id: &str, version: &str) -> ComponentKey {
    ComponentKey::new(id, v(version))
}

pub fn builder(id: &str, version: &str) -> ComponentBuilder {
    Component::builder(id, v(version))
}

pub fn comp(id: &str, version: &str) -> Arc<Component> {
    builder(id, version).build()
}

pub fn planner() -> Planner {
    Planner::new(PlannerOptions::default()).unwrap()
}

pub fn catalog(components: &[Arc<Component>]) -> Catalog {
    components.iter().cloned().collect()
}

/// Operands rendered the way the CLI prints them.
pub fn render(plan: &ProvisioningPlan) -> Vec<String> {
    plan.operands().iter().map(Operand::to_string).collect()
}

/// Applies `plan` to `profile` the way an engine would record the next revision.
pub fn apply(profile: &Profile, plan: &ProvisioningPlan) -> Profile {
    assert!(plan.is_success(), "cannot apply {}", plan.status().flatten());

    let mut properties: BTreeMap<String, String> = profile.properties().clone();
    let mut component_properties: BTreeMap<ComponentKey, BTreeMap<String, String>> = profile
        .installed()
        .iter()
        .filter_map(|c| {
            profile
                .component_properties(c.key())
                .map(|props| (c.key().clone(), props.clone()))
        })
        .collect();

    for operand in plan.property_operands() {
        match operand {
            PropertyOperand::Profile { key, new, .. } => match new {
                Some(value) => {
                    properties.insert(key.clone(), value.clone());
                }
                None => {
                    properties.remove(key);
                }
            },
            PropertyOperand::Component {
                component,
                key,
                new,
                ..
            } => {
                let props = component_properties.entry(component.clone()).or_default();
                match new {
                    Some(value) => {
                        props.insert(key.clone(), value.clone());
                    }
                    None => {
                        props.remove(key);
                    }
                }
            }
        }
    }

    let mut next = Profile::new(profile.id())
        .with_timestamp(profile.timestamp() + 1)
        .with_installed(plan.future_state().iter().cloned());
    for (key, value) in properties {
        next = next.with_property(key, value);
    }
    for (component, props) in component_properties {
        if !next.is_installed(&component) {
            continue;
        }
        for (key, value) in props {
            next = next.with_component_property(&component, key, value);
        }
    }
    next
}
