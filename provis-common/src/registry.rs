// provis-common/src/registry.rs
// In-memory history of profile revisions.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ProvisError, Result};
use super::model::profile::SELF_PROFILE;
use super::model::Profile;

/// Known profiles and every recorded revision of each.
///
/// Revisions of a profile are kept sorted by timestamp and timestamps are
/// strictly increasing. The reserved id `_SELF_` is an alias for the profile
/// named by `self_id`.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    self_id: Option<String>,
    revisions: BTreeMap<String, Vec<Profile>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistrySnapshot {
    #[serde(default, rename = "self")]
    self_id: Option<String>,
    #[serde(default)]
    profiles: Vec<Profile>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the profile that `_SELF_` resolves to.
    pub fn with_self(mut self, id: impl Into<String>) -> Self {
        self.self_id = Some(id.into());
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshot: RegistrySnapshot = serde_json::from_str(raw)?;
        let mut registry = Self {
            self_id: snapshot.self_id,
            revisions: BTreeMap::new(),
        };
        for profile in snapshot.profiles {
            let history = registry
                .revisions
                .entry(profile.id().to_string())
                .or_default();
            if history.iter().any(|p| p.timestamp() == profile.timestamp()) {
                return Err(ProvisError::ParseError(
                    "profile registry",
                    format!(
                        "duplicate revision {} of profile '{}'",
                        profile.timestamp(),
                        profile.id()
                    ),
                ));
            }
            history.push(profile);
            history.sort_by_key(Profile::timestamp);
        }
        debug!(
            "Loaded {} profiles into the registry.",
            registry.revisions.len()
        );
        Ok(registry)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading profile registry from {}", path.display());
        if !path.exists() {
            return Err(ProvisError::NotFound(format!(
                "profile registry {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        let snapshot = RegistrySnapshot {
            self_id: self.self_id.clone(),
            profiles: self.revisions.values().flatten().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Maps `_SELF_` to the concrete profile id.
    pub fn resolve_id<'a>(&'a self, id: &'a str) -> Result<&'a str> {
        if id != SELF_PROFILE {
            return Ok(id);
        }
        self.self_id
            .as_deref()
            .ok_or_else(|| ProvisError::NotFound("no profile is registered as _SELF_".to_string()))
    }

    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.revisions.keys().map(String::as_str)
    }

    /// Latest revision of `id`.
    pub fn profile(&self, id: &str) -> Result<&Profile> {
        let id = self.resolve_id(id)?;
        self.history(id)?
            .last()
            .ok_or_else(|| ProvisError::NotFound(format!("profile '{id}'")))
    }

    /// The revision of `id` recorded at exactly `timestamp`.
    pub fn profile_at(&self, id: &str, timestamp: u64) -> Result<&Profile> {
        let id = self.resolve_id(id)?;
        self.history(id)?
            .iter()
            .find(|p| p.timestamp() == timestamp)
            .ok_or_else(|| ProvisError::NotFound(format!("revision {timestamp} of profile '{id}'")))
    }

    /// Revision timestamps of `id`, oldest first.
    pub fn timestamps(&self, id: &str) -> Result<Vec<u64>> {
        let id = self.resolve_id(id)?;
        Ok(self.history(id)?.iter().map(Profile::timestamp).collect())
    }

    /// Records `profile` as the newest revision of its id and returns the
    /// timestamp it was stored under.
    pub fn add_revision(&mut self, profile: Profile) -> Result<u64> {
        let id = self.resolve_id(profile.id())?.to_string();
        let history = self.revisions.entry(id.clone()).or_default();
        let previous = history.last().map(Profile::timestamp);
        let timestamp = match previous {
            Some(last) => now_millis().max(last + 1),
            None => now_millis(),
        };
        let installed = profile.installed().iter().cloned();
        let mut revision = Profile::new(id.clone())
            .with_installed(installed)
            .with_timestamp(timestamp);
        for (key, value) in profile.properties() {
            revision = revision.with_property(key.clone(), value.clone());
        }
        for component in profile.installed() {
            if let Some(props) = profile.component_properties(component.key()) {
                for (key, value) in props {
                    revision =
                        revision.with_component_property(component.key(), key.clone(), value.clone());
                }
            }
        }
        debug!("Recorded revision {timestamp} of profile '{id}'");
        history.push(revision);
        Ok(timestamp)
    }

    fn history(&self, id: &str) -> Result<&Vec<Profile>> {
        self.revisions
            .get(id)
            .ok_or_else(|| ProvisError::NotFound(format!("profile '{id}'")))
    }
}
