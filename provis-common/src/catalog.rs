// provis-common/src/catalog.rs
// In-memory set of installable components.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cancel::CancellationToken;
use super::error::{ProvisError, Result};
use super::model::{Component, ComponentKey, Profile};
use super::query::{query_iter, Query, QueryResult, Queryable};

/// The components available for installation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    components: BTreeSet<Arc<Component>>,
}

/// On-disk snapshot shape: `{ "components": [...] }`.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogSnapshot {
    #[serde(default)]
    components: Vec<Arc<Component>>,
}

impl Catalog {
    pub fn new<I>(components: I) -> Self
    where
        I: IntoIterator<Item = Arc<Component>>,
    {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: CatalogSnapshot = serde_json::from_str(raw)?;
        debug!("Parsed {} catalog components.", snapshot.components.len());
        Ok(Self::new(snapshot.components))
    }

    /// Reads a catalog snapshot from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog snapshot from {}", path.display());
        if !path.exists() {
            return Err(ProvisError::NotFound(format!(
                "catalog snapshot {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        let snapshot = CatalogSnapshot {
            components: self.components.iter().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    pub fn insert(&mut self, component: Arc<Component>) {
        self.components.insert(component);
    }

    pub fn get(&self, key: &ComponentKey) -> Option<&Arc<Component>> {
        self.components.get(key)
    }

    pub fn components(&self) -> &BTreeSet<Arc<Component>> {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromIterator<Arc<Component>> for Catalog {
    fn from_iter<I: IntoIterator<Item = Arc<Component>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl Queryable<Arc<Component>> for Catalog {
    fn query(
        &self,
        query: &Query<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Component>> {
        query_iter(self.components.iter().cloned(), query, cancel)
    }
}

impl Queryable<Arc<Component>> for Profile {
    fn query(
        &self,
        query: &Query<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> QueryResult<Arc<Component>> {
        query_iter(self.installed().iter().cloned(), query, cancel)
    }
}
