// provis-common/src/query/component.rs
//! Standard queries over `Arc<Component>` collections.
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Collector, ContextQuery, Query};
use crate::model::component::{PROP_GROUP, PROP_PRODUCT};
use crate::model::{Component, ComponentKey, Requirement, VersionRange};

pub type ComponentQuery = Query<Arc<Component>>;

pub fn all() -> ComponentQuery {
    Query::all()
}

pub fn matching<F>(predicate: F) -> ComponentQuery
where
    F: Fn(&Component) -> bool + Send + Sync + 'static,
{
    Query::matching(move |c: &Arc<Component>| predicate(c.as_ref()))
}

pub fn by_id(id: impl Into<String>) -> ComponentQuery {
    let id = id.into();
    matching(move |c| c.id() == id)
}

pub fn by_id_in_range(id: impl Into<String>, range: VersionRange) -> ComponentQuery {
    let id = id.into();
    matching(move |c| c.id() == id && range.includes(c.version()))
}

pub fn by_key(key: ComponentKey) -> ComponentQuery {
    matching(move |c| *c.key() == key)
}

/// Components carrying property `key`; with `value`, only where it equals it.
pub fn with_property(key: impl Into<String>, value: Option<String>) -> ComponentQuery {
    let key = key.into();
    matching(move |c| match (&value, c.property(&key)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(expected), Some(actual)) => expected == actual,
    })
}

pub fn products() -> ComponentQuery {
    with_property(PROP_PRODUCT, Some("true".to_string()))
}

pub fn groups() -> ComponentQuery {
    with_property(PROP_GROUP, Some("true".to_string()))
}

/// Components satisfying `requirement`, ignoring its cardinality.
pub fn satisfying(requirement: Requirement) -> ComponentQuery {
    matching(move |c| requirement.is_satisfied_by(c))
}

/// Newer components whose update descriptor covers `component`.
pub fn updates_of(component: &Component) -> ComponentQuery {
    let key = component.key().clone();
    matching(move |c| c.is_update_of(&key))
}

/// Highest version per id.
pub fn latest() -> ComponentQuery {
    Query::from_context(LatestQuery)
}

struct LatestQuery;

impl ContextQuery<Arc<Component>> for LatestQuery {
    fn perform(
        &self,
        input: &mut dyn Iterator<Item = Arc<Component>>,
        collector: &mut Collector<Arc<Component>>,
    ) {
        let mut newest: BTreeMap<String, Arc<Component>> = BTreeMap::new();
        for candidate in input {
            match newest.get(candidate.id()) {
                Some(current) if current.version() >= candidate.version() => {}
                _ => {
                    newest.insert(candidate.id().to_string(), candidate);
                }
            }
        }
        collector.accept_while(newest.into_values());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Version;

    fn c(id: &str, major: u64) -> Arc<Component> {
        Component::builder(id, Version::new(major, 0, 0)).build()
    }

    #[test]
    fn latest_keeps_highest_per_id() {
        let input = vec![c("a", 1), c("a", 3), c("b", 2), c("a", 2)];
        let result = latest().perform(input);
        let keys: Vec<String> = result.iter().map(|c| c.key().to_string()).collect();
        assert_eq!(keys, vec!["a 3.0.0", "b 2.0.0"]);
    }

    #[test]
    fn property_query_with_and_without_value() {
        let product = Component::builder("p", Version::new(1, 0, 0))
            .property(PROP_PRODUCT, "true")
            .build();
        let other = Component::builder("q", Version::new(1, 0, 0))
            .property(PROP_PRODUCT, "false")
            .build();
        let input = vec![product.clone(), other.clone(), c("r", 1)];
        assert_eq!(products().perform(input.clone()).to_vec(), vec![product]);
        assert_eq!(with_property(PROP_PRODUCT, None).perform(input).len(), 2);
    }

    #[test]
    fn updates_of_requires_newer_version_in_range() {
        let base = c("a", 1);
        let newer = Component::builder("a", Version::new(2, 0, 0))
            .update_from("a", VersionRange::any())
            .build();
        let older = Component::builder("a", Version::new(0, 5, 0))
            .update_from("a", VersionRange::any())
            .build();
        let result = updates_of(&base).perform(vec![newer.clone(), older, base.clone()]);
        assert_eq!(result.to_vec(), vec![newer]);
    }
}
