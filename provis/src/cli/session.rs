// provis/src/cli/session.rs
//! Snapshots loaded once per command: catalog, profile registry, current profile.
use std::str::FromStr;
use std::sync::Arc;

use provis_common::error::{ProvisError, Result};
use provis_common::query::{component, Query, Queryable};
use provis_common::{
    CancellationToken, Catalog, Component, ComponentKey, Config, Profile, ProfileRegistry,
};
use provis_core::{Planner, PlannerOptions};
use tokio::task::JoinError;
use tracing::{debug, warn};

fn join_to_err(e: JoinError) -> ProvisError {
    ProvisError::Generic(format!("Task join error: {e}"))
}

pub struct Session {
    pub catalog: Arc<Catalog>,
    pub registry: ProfileRegistry,
    pub profile: Arc<Profile>,
    pub planner: Arc<Planner>,
    pub profile_id: String,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self> {
        let catalog = match Catalog::load(config.catalog_path()) {
            Ok(catalog) => catalog,
            Err(ProvisError::NotFound(msg)) => {
                warn!("{msg}, using an empty catalog");
                Catalog::new(Vec::new())
            }
            Err(e) => return Err(e),
        };
        let registry = match ProfileRegistry::load(config.profiles_path()) {
            Ok(registry) => registry,
            Err(ProvisError::NotFound(msg)) => {
                warn!("{msg}, using an empty profile registry");
                ProfileRegistry::new()
            }
            Err(e) => return Err(e),
        };
        let profile = match registry.profile(&config.profile_id) {
            Ok(profile) => profile.clone(),
            Err(ProvisError::NotFound(msg)) => {
                warn!("{msg}, planning against an empty profile");
                Profile::new(config.profile_id.clone())
            }
            Err(e) => return Err(e),
        };
        let planner = Planner::new(PlannerOptions::from_config(config))?;
        debug!(
            "Session ready: {} catalog components, profile '{}' with {} installed",
            catalog.len(),
            profile.id(),
            profile.installed().len()
        );
        Ok(Self {
            catalog: Arc::new(catalog),
            registry,
            profile: Arc::new(profile),
            planner: Arc::new(planner),
            profile_id: config.profile_id.clone(),
        })
    }

    /// Looks up `id@version`, or the newest catalog version of a bare `id`.
    pub fn available(&self, spec: &str) -> Result<Arc<Component>> {
        if spec.contains('@') {
            let key = ComponentKey::from_str(spec)?;
            return self
                .catalog
                .get(&key)
                .or_else(|| self.profile.get(&key))
                .cloned()
                .ok_or_else(|| ProvisError::NotFound(format!("No component {key} in the catalog")));
        }
        let newest = Query::pipe(vec![component::by_id(spec), component::latest()]);
        self.catalog
            .query(&newest, &CancellationToken::new())
            .last()
            .cloned()
            .ok_or_else(|| ProvisError::NotFound(format!("No component '{spec}' in the catalog")))
    }

    /// Looks up an installed `id@version`, or the newest installed version of `id`.
    pub fn installed(&self, spec: &str) -> Result<Arc<Component>> {
        let found = if spec.contains('@') {
            let key = ComponentKey::from_str(spec)?;
            self.profile.get(&key).cloned()
        } else {
            self.profile.installed_with_id(spec).last().cloned()
        };
        found.ok_or_else(|| {
            ProvisError::NotFound(format!(
                "'{spec}' is not installed in profile '{}'",
                self.profile.id()
            ))
        })
    }

    /// Runs `work` on the blocking pool. Ctrl-C trips the cancellation token
    /// and the (now canceled) result is still returned.
    pub async fn plan<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Planner, &Catalog, &Profile, &CancellationToken) -> T + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let mut task = tokio::task::spawn_blocking({
            let planner = Arc::clone(&self.planner);
            let catalog = Arc::clone(&self.catalog);
            let profile = Arc::clone(&self.profile);
            let cancel = cancel.clone();
            move || work(&planner, &catalog, &profile, &cancel)
        });
        let joined = tokio::select! {
            joined = &mut task => joined,
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted, canceling the resolution");
                cancel.cancel();
                task.await
            }
        };
        joined.map_err(join_to_err)
    }
}
