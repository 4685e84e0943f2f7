// provis-core/src/ordering.rs
// Deterministic dependency order of a component set.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use provis_common::model::{Component, ComponentKey, RequirementMatch};
use tracing::{debug, warn};

/// Orders `components` so that every provider precedes the components whose
/// requirements it satisfies.
///
/// Only edges inside the set count. Ties are broken by [`ComponentKey`] order,
/// so the result does not depend on how the set was built. A cycle is broken
/// by emitting its smallest remaining key.
pub fn dependency_order(components: &BTreeSet<Arc<Component>>) -> Vec<Arc<Component>> {
    let by_key: BTreeMap<&ComponentKey, &Arc<Component>> =
        components.iter().map(|c| (c.key(), c)).collect();
    let mut in_degree: BTreeMap<&ComponentKey, usize> =
        by_key.keys().map(|key| (*key, 0)).collect();
    let mut dependents: BTreeMap<&ComponentKey, BTreeSet<&ComponentKey>> = BTreeMap::new();
    let mut by_capability: BTreeMap<(&str, &str), Vec<&Arc<Component>>> = BTreeMap::new();
    for component in components {
        let buckets: BTreeSet<(&str, &str)> = component
            .provides()
            .map(|cap| (cap.namespace.as_str(), cap.name.as_str()))
            .collect();
        for bucket in buckets {
            by_capability.entry(bucket).or_default().push(component);
        }
    }

    for consumer in components {
        for requirement in consumer.requires().filter(|r| !r.is_negative()) {
            let candidates: Vec<&Arc<Component>> = match &requirement.matcher {
                RequirementMatch::Capability {
                    namespace, name, ..
                } => by_capability
                    .get(&(namespace.as_str(), name.as_str()))
                    .cloned()
                    .unwrap_or_default(),
                RequirementMatch::OneOf(keys) => {
                    keys.iter().filter_map(|key| by_key.get(key).copied()).collect()
                }
            };
            for provider in candidates {
                if provider.key() == consumer.key() || !requirement.is_satisfied_by(provider) {
                    continue;
                }
                if dependents
                    .entry(provider.key())
                    .or_default()
                    .insert(consumer.key())
                {
                    *in_degree.entry(consumer.key()).or_default() += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<&ComponentKey> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(key, _)| *key)
        .collect();
    let mut emitted: BTreeSet<&ComponentKey> = BTreeSet::new();
    let mut sorted = Vec::with_capacity(components.len());

    while sorted.len() < components.len() {
        let next = match ready.pop_first() {
            Some(key) => key,
            None => {
                let Some(key) = in_degree
                    .keys()
                    .find(|key| !emitted.contains(*key))
                    .copied()
                else {
                    break;
                };
                warn!("Dependency cycle detected, breaking it at {}", key);
                key
            }
        };
        if !emitted.insert(next) {
            continue;
        }
        if let Some(component) = by_key.get(next) {
            sorted.push(Arc::clone(component));
        }
        if let Some(children) = dependents.get(next) {
            for child in children {
                if emitted.contains(child) {
                    continue;
                }
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    debug!("Ordered {} components", sorted.len());
    sorted
}
