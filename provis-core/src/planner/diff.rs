// provis-core/src/planner/diff.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use provis_common::model::{
    Component, ComponentKey, Operand, Profile, ProfileChangeRequest, PropertyOperand,
};

use crate::ordering::dependency_order;

/// Diffs the old and new installed sets into ordered operands.
///
/// One old and one new version of the same id pair up as an update. Adds come
/// first in new-state dependency order, then removes in reverse old-state
/// order, then updates in the new-state order of their target.
pub(crate) fn diff_states(
    old: &BTreeSet<Arc<Component>>,
    new: &BTreeSet<Arc<Component>>,
) -> Vec<Operand> {
    let mut added_by_id: BTreeMap<&str, Vec<&Arc<Component>>> = BTreeMap::new();
    for component in new.difference(old) {
        added_by_id.entry(component.id()).or_default().push(component);
    }
    let mut removed_by_id: BTreeMap<&str, Vec<&Arc<Component>>> = BTreeMap::new();
    for component in old.difference(new) {
        removed_by_id.entry(component.id()).or_default().push(component);
    }

    // Keyed by the update target.
    let mut updates: BTreeMap<ComponentKey, Arc<Component>> = BTreeMap::new();
    let mut update_sources: BTreeSet<ComponentKey> = BTreeSet::new();
    for (id, added) in &added_by_id {
        if let (Some(removed), [to]) = (removed_by_id.get(id), added.as_slice()) {
            if let [from] = removed.as_slice() {
                updates.insert(to.key().clone(), Arc::clone(from));
                update_sources.insert(from.key().clone());
            }
        }
    }

    let new_order = dependency_order(new);
    let old_order = dependency_order(old);
    let mut operands = Vec::new();

    for component in &new_order {
        if !old.contains(component) && !updates.contains_key(component.key()) {
            operands.push(Operand::Add(Arc::clone(component)));
        }
    }
    for component in old_order.iter().rev() {
        if !new.contains(component) && !update_sources.contains(component.key()) {
            operands.push(Operand::Remove(Arc::clone(component)));
        }
    }
    for component in &new_order {
        if let Some(from) = updates.get(component.key()) {
            operands.push(Operand::Update {
                from: Arc::clone(from),
                to: Arc::clone(component),
            });
        }
    }
    operands
}

/// Property changes implied by `operands` plus those the request asks for.
///
/// Removed components lose their per-component properties, updated ones carry
/// them over to the new key. Request changes only apply to components that
/// are installed afterwards.
pub(crate) fn property_operands(
    request: &ProfileChangeRequest,
    profile: &Profile,
    new_state: &BTreeSet<Arc<Component>>,
    operands: &[Operand],
) -> Vec<PropertyOperand> {
    let mut result = Vec::new();

    let mut profile_changes: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for (key, value) in &request.property_adds {
        profile_changes.insert(key, Some(value));
    }
    for key in &request.property_removes {
        profile_changes.insert(key, None);
    }
    for (key, new) in profile_changes {
        let old = profile.property(key);
        if old != new {
            result.push(PropertyOperand::Profile {
                key: key.to_string(),
                old: old.map(str::to_string),
                new: new.map(str::to_string),
            });
        }
    }

    type Change = (Option<String>, Option<String>);
    let mut changes: BTreeMap<(ComponentKey, String), Change> = BTreeMap::new();
    for operand in operands {
        match operand {
            Operand::Remove(component) => {
                for (key, value) in profile.component_properties(component.key()).into_iter().flatten() {
                    changes.insert(
                        (component.key().clone(), key.clone()),
                        (Some(value.clone()), None),
                    );
                }
            }
            Operand::Update { from, to } => {
                for (key, value) in profile.component_properties(from.key()).into_iter().flatten() {
                    changes.insert((from.key().clone(), key.clone()), (Some(value.clone()), None));
                    changes.insert((to.key().clone(), key.clone()), (None, Some(value.clone())));
                }
            }
            Operand::Add(_) | Operand::Property(_) => {}
        }
    }

    let installed_after: BTreeSet<&ComponentKey> = new_state.iter().map(|c| c.key()).collect();
    for (component, props) in &request.component_property_adds {
        if !installed_after.contains(component) {
            continue;
        }
        for (key, value) in props {
            let entry = changes
                .entry((component.clone(), key.clone()))
                .or_insert_with(|| (profile.component_property(component, key).map(str::to_string), None));
            entry.1 = Some(value.clone());
        }
    }
    for (component, keys) in &request.component_property_removes {
        if !installed_after.contains(component) {
            continue;
        }
        for key in keys {
            let entry = changes
                .entry((component.clone(), key.clone()))
                .or_insert_with(|| (profile.component_property(component, key).map(str::to_string), None));
            entry.1 = None;
        }
    }

    for ((component, key), (old, new)) in changes {
        if old != new {
            result.push(PropertyOperand::Component {
                component,
                key,
                old,
                new,
            });
        }
    }
    result
}
