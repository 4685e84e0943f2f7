// provis-core/src/resolver/candidates.rs
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use provis_common::model::component::PROP_RECOMMENDED;
use provis_common::model::{Component, ComponentKey, Requirement, RequirementMatch};

/// Lookup of pool components by provided capability and by key.
pub(super) struct CandidateIndex {
    by_capability: BTreeMap<(String, String), Vec<Arc<Component>>>,
    by_key: BTreeMap<ComponentKey, Arc<Component>>,
    installed: BTreeSet<ComponentKey>,
}

impl CandidateIndex {
    pub(super) fn new(
        pool: &BTreeSet<Arc<Component>>,
        installed: &BTreeSet<Arc<Component>>,
    ) -> Self {
        let mut by_capability: BTreeMap<(String, String), Vec<Arc<Component>>> = BTreeMap::new();
        let mut by_key = BTreeMap::new();
        for component in pool {
            for capability in component.provides() {
                by_capability
                    .entry((capability.namespace.clone(), capability.name.clone()))
                    .or_default()
                    .push(Arc::clone(component));
            }
            by_key.insert(component.key().clone(), Arc::clone(component));
        }
        Self {
            by_capability,
            by_key,
            installed: installed.iter().map(|c| c.key().clone()).collect(),
        }
    }

    /// Pool components satisfying `requirement`, most preferred first.
    pub(super) fn providers(&self, requirement: &Requirement) -> Vec<Arc<Component>> {
        let mut providers: Vec<Arc<Component>> = match &requirement.matcher {
            RequirementMatch::Capability {
                namespace, name, ..
            } => self
                .by_capability
                .get(&(namespace.clone(), name.clone()))
                .map(|found| {
                    found
                        .iter()
                        .filter(|c| requirement.is_satisfied_by(c))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            RequirementMatch::OneOf(keys) => keys
                .iter()
                .filter_map(|key| self.by_key.get(key))
                .cloned()
                .collect(),
        };
        providers.sort_by(|a, b| self.preference(a, b));
        providers.dedup_by(|a, b| a.key() == b.key());
        providers
    }

    /// Installed first, then highest version, then recommended, then key order.
    fn preference(&self, a: &Component, b: &Component) -> Ordering {
        let a_installed = self.installed.contains(a.key());
        let b_installed = self.installed.contains(b.key());
        b_installed
            .cmp(&a_installed)
            .then_with(|| b.version().cmp(a.version()))
            .then_with(|| b.has_flag(PROP_RECOMMENDED).cmp(&a.has_flag(PROP_RECOMMENDED)))
            .then_with(|| a.key().cmp(b.key()))
    }
}
