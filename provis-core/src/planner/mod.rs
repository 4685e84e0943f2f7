// provis-core/src/planner/mod.rs
//! Turns change requests into ordered provisioning plans.
//!
//! Every entry point takes the profile and catalog as parameters, snapshots the
//! candidate pool at entry and returns a [`ProvisioningPlan`]. Failures are
//! reported through the plan's status, never as errors.

mod diff;

use std::collections::BTreeSet;
use std::sync::Arc;

use provis_common::cancel::CancellationToken;
use provis_common::config::{Config, DEFAULT_MAX_SEARCH_STEPS};
use provis_common::error::{ProvisError, Result};
use provis_common::model::profile::PROP_ROOT;
use provis_common::model::{
    Component, ComponentKey, Profile, ProfileChangeRequest, ProvisioningPlan, Requirement,
    Version,
};
use provis_common::query::{component, Queryable};
use provis_common::status::Status;
use tracing::debug;

use crate::resolver::{ClosureResolver, ResolutionInput, RootSpec};

/// Id prefix of the synthetic components built by [`revert_target`].
pub const REVERT_TARGET_PREFIX: &str = "provis.revert.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    pub max_search_steps: u64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_search_steps: DEFAULT_MAX_SEARCH_STEPS,
        }
    }
}

impl PlannerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_search_steps: config.max_search_steps,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    resolver: ClosureResolver,
}

impl Planner {
    pub fn new(options: PlannerOptions) -> Result<Self> {
        if options.max_search_steps == 0 {
            return Err(ProvisError::InvalidOptions(
                "max_search_steps must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            resolver: ClosureResolver::new(options.max_search_steps),
        })
    }

    pub fn resolver(&self) -> &ClosureResolver {
        &self.resolver
    }

    /// Installs `roots` as new strict roots on top of `profile`. Everything
    /// already installed stays installed.
    ///
    /// Asking for a component that is already installed at the same identity
    /// is blocked with a WARNING and yields no operands.
    pub fn get_install_plan(
        &self,
        roots: &[Arc<Component>],
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        let mut request = ProfileChangeRequest::new(profile.id());
        for root in roots {
            request.add(Arc::clone(root));
            request.set_component_property(root.key(), PROP_ROOT, "true");
            request.set_inclusion_strict(root.key());
        }

        let already: Vec<&ComponentKey> = roots
            .iter()
            .map(|r| r.key())
            .filter(|key| profile.is_installed(key))
            .collect();
        if !already.is_empty() {
            let mut status = Status::warning("Some requested components are already installed");
            for key in already {
                status.add_child(
                    Status::warning(format!("{key} is already installed"))
                        .for_component(key.clone()),
                );
            }
            debug!("Install blocked: {}", status);
            return ProvisioningPlan::failed(status, request);
        }
        self.get_provisioning_plan(&request, profile, catalog, cancel)
    }

    /// Removes `roots` and whatever only they needed.
    pub fn get_uninstall_plan(
        &self,
        roots: &[Arc<Component>],
        profile: &Profile,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        let requested: Vec<Arc<Component>> = roots
            .iter()
            .filter_map(|root| profile.get(root.key()).cloned())
            .collect();
        let mut request = ProfileChangeRequest::new(profile.id());
        request.remove_all(requested.iter().cloned());
        if requested.is_empty() {
            return ProvisioningPlan::new(
                Status::ok_with("Nothing to uninstall"),
                request,
                Vec::new(),
                Vec::new(),
                profile.installed().clone(),
            );
        }
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request);
        }

        let installed = profile.installed();
        let removable = match self.closure_within(&requested, installed, cancel) {
            Ok(closure) => closure,
            Err(status) => return ProvisioningPlan::failed(status, request),
        };

        let kept = self.resolver.resolve(
            &ResolutionInput {
                roots: kept_roots(profile, &removable, &requested),
                extra_requirements: Vec::new(),
                already_installed: installed.clone(),
                pool: installed.clone(),
            },
            cancel,
        );
        if !kept.is_success() {
            return ProvisioningPlan::failed(kept.status, request);
        }

        let survivors: Vec<&Arc<Component>> = requested
            .iter()
            .filter(|root| kept.closure.contains(*root))
            .collect();
        if !survivors.is_empty() {
            let mut status = Status::error("Cannot uninstall the requested components");
            for root in survivors {
                let dependents: Vec<String> = kept
                    .closure
                    .iter()
                    .filter(|c| c.key() != root.key())
                    .filter(|c| c.requires().any(|r| !r.is_negative() && r.is_satisfied_by(root)))
                    .map(|c| c.key().to_string())
                    .collect();
                let message = if dependents.is_empty() {
                    format!("{} cannot be removed: it is still required", root.key())
                } else {
                    format!(
                        "{} cannot be removed: it is still required by {}",
                        root.key(),
                        dependents.join(", ")
                    )
                };
                status.add_child(Status::error(message).for_component(root.key().clone()));
            }
            debug!("Uninstall rejected: {}", status);
            return ProvisioningPlan::failed(status, request);
        }

        let mut new_state = kept.closure;
        new_state.extend(installed.difference(&removable).cloned());
        self.finish(request, profile, new_state, kept.status, cancel)
    }

    /// Uninstalls `to_uninstall` and installs `to_install` in one plan.
    pub fn get_replace_plan(
        &self,
        to_uninstall: &[Arc<Component>],
        to_install: &[Arc<Component>],
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        let uninstalling: Vec<Arc<Component>> = to_uninstall
            .iter()
            .filter_map(|c| profile.get(c.key()).cloned())
            .collect();
        let mut request = ProfileChangeRequest::new(profile.id());
        request.remove_all(uninstalling.iter().cloned());
        for root in to_install {
            request.add(Arc::clone(root));
            request.set_component_property(root.key(), PROP_ROOT, "true");
            request.set_inclusion_strict(root.key());
        }
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request);
        }

        let installed = profile.installed();
        let removable = match self.closure_within(&uninstalling, installed, cancel) {
            Ok(closure) => closure,
            Err(status) => return ProvisioningPlan::failed(status, request),
        };
        let mut roots: Vec<RootSpec> = to_install.iter().cloned().map(RootSpec::strict).collect();
        roots.extend(kept_roots(profile, &removable, &uninstalling));
        let resolution = self.resolver.resolve(
            &ResolutionInput {
                roots,
                extra_requirements: Vec::new(),
                already_installed: installed.clone(),
                pool: self.pool(profile, catalog, cancel),
            },
            cancel,
        );
        if !resolution.is_success() {
            return ProvisioningPlan::failed(resolution.status, request);
        }
        self.finish(request, profile, resolution.closure, resolution.status, cancel)
    }

    /// Makes the installed set match the closure of `target`'s requirements.
    /// The target itself is never installed.
    pub fn get_become_plan(
        &self,
        target: &Arc<Component>,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        let request = ProfileChangeRequest::new(profile.id());
        self.become_with(target, BTreeSet::new(), request, profile, catalog, cancel)
    }

    /// Returns `profile` to the state recorded in `revision`, properties included.
    pub fn get_revert_plan(
        &self,
        revision: &Profile,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        let mut request = ProfileChangeRequest::new(profile.id());
        for (key, value) in revision.properties() {
            request.set_profile_property(key.clone(), value.clone());
        }
        for key in profile.properties().keys() {
            if revision.property(key).is_none() {
                request.remove_profile_property(key.clone());
            }
        }
        for component in revision.installed() {
            let wanted = revision.component_properties(component.key());
            for (key, value) in wanted.into_iter().flatten() {
                request.set_component_property(component.key(), key.clone(), value.clone());
            }
            let current = profile.component_properties(component.key());
            for key in current.into_iter().flat_map(|props| props.keys()) {
                if revision.component_property(component.key(), key).is_none() {
                    request.remove_component_property(component.key(), key.clone());
                }
            }
        }
        let target = revert_target(revision);
        self.become_with(
            &target,
            revision.installed().clone(),
            request,
            profile,
            catalog,
            cancel,
        )
    }

    /// The general form: adds the requested components, injects the request's
    /// extra requirements and keeps every installed component outside the
    /// installed closure of what the request removes. Components inside that
    /// closure stay only where something still needs them.
    pub fn get_provisioning_plan(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request.clone());
        }
        let removing: Vec<Arc<Component>> = request
            .to_remove
            .iter()
            .filter_map(|c| profile.get(c.key()).cloned())
            .collect();
        let installed = profile.installed();
        let removable = match self.closure_within(&removing, installed, cancel) {
            Ok(closure) => closure,
            Err(status) => return ProvisioningPlan::failed(status, request.clone()),
        };
        let mut roots = kept_roots(profile, &removable, &removing);
        roots.extend(request.to_add.iter().map(|added| RootSpec {
            component: Arc::clone(added),
            strict: !request.is_optional_inclusion(added.key()),
        }));

        let resolution = self.resolver.resolve(
            &ResolutionInput {
                roots,
                extra_requirements: request.extra_requirements.iter().cloned().collect(),
                already_installed: profile.installed().clone(),
                pool: self.pool(profile, catalog, cancel),
            },
            cancel,
        );
        if !resolution.is_success() {
            return ProvisioningPlan::failed(resolution.status, request.clone());
        }
        self.finish(
            request.clone(),
            profile,
            resolution.closure,
            resolution.status,
            cancel,
        )
    }

    /// Catalog components that declare themselves updates of `component`.
    pub fn updates_for(
        &self,
        component: &Component,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<Component>> {
        catalog
            .query(&component::updates_of(component), cancel)
            .into_iter()
            .collect()
    }

    fn become_with(
        &self,
        target: &Arc<Component>,
        extra_pool: BTreeSet<Arc<Component>>,
        mut request: ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request);
        }
        let mut pool = self.pool(profile, catalog, cancel);
        pool.extend(extra_pool);
        let resolution = self.resolver.resolve(
            &ResolutionInput {
                roots: vec![RootSpec::strict(Arc::clone(target))],
                extra_requirements: Vec::new(),
                already_installed: profile.installed().clone(),
                pool,
            },
            cancel,
        );
        if !resolution.is_success() {
            return ProvisioningPlan::failed(resolution.status, request);
        }
        let mut closure = resolution.closure;
        closure.remove(target);
        request.add_all(closure.difference(profile.installed()).cloned());
        request.remove_all(profile.installed().difference(&closure).cloned());
        self.finish(request, profile, closure, resolution.status, cancel)
    }

    /// Closure of `roots` using installed components only.
    fn closure_within(
        &self,
        roots: &[Arc<Component>],
        installed: &BTreeSet<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<BTreeSet<Arc<Component>>, Status> {
        if roots.is_empty() {
            return Ok(BTreeSet::new());
        }
        let resolution = self.resolver.resolve(
            &ResolutionInput {
                roots: roots.iter().cloned().map(RootSpec::strict).collect(),
                extra_requirements: Vec::new(),
                already_installed: installed.clone(),
                pool: installed.clone(),
            },
            cancel,
        );
        if resolution.is_success() {
            Ok(resolution.closure)
        } else {
            Err(resolution.status)
        }
    }

    /// Catalog contents plus everything installed, taken once per call.
    fn pool(
        &self,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> BTreeSet<Arc<Component>> {
        let mut pool = catalog.query(&component::all(), cancel).into_set();
        pool.extend(profile.installed().iter().cloned());
        pool
    }

    fn finish(
        &self,
        request: ProfileChangeRequest,
        profile: &Profile,
        new_state: BTreeSet<Arc<Component>>,
        status: Status,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request);
        }
        let operands = diff::diff_states(profile.installed(), &new_state);
        if cancel.is_canceled() {
            return ProvisioningPlan::failed(Status::canceled(), request);
        }
        let property_operands = diff::property_operands(&request, profile, &new_state, &operands);
        debug!(
            "Planned {} operands and {} property changes for profile '{}'",
            operands.len(),
            property_operands.len(),
            profile.id()
        );
        ProvisioningPlan::new(status, request, operands, property_operands, new_state)
    }
}

/// Roots that keep what a change does not remove: every installed component
/// outside `removable`, plus the profile roots inside it that are not being
/// removed themselves. Marked roots follow their inclusion rule; every other
/// component is kept strictly.
fn kept_roots(
    profile: &Profile,
    removable: &BTreeSet<Arc<Component>>,
    removing: &[Arc<Component>],
) -> Vec<RootSpec> {
    let removing: BTreeSet<&ComponentKey> = removing.iter().map(|c| c.key()).collect();
    let roots: BTreeSet<Arc<Component>> = profile.roots().into_iter().collect();
    profile
        .installed()
        .iter()
        .filter(|c| !removable.contains(*c) || (roots.contains(*c) && !removing.contains(c.key())))
        .map(|c| root_spec(profile, Arc::clone(c)))
        .collect()
}

fn root_spec(profile: &Profile, root: Arc<Component>) -> RootSpec {
    let strict = profile.is_strict(root.key());
    RootSpec {
        component: root,
        strict,
    }
}

/// Builds the synthetic target whose requirements pin every component of
/// `revision`. Use it with [`Planner::get_become_plan`] when the recorded
/// components are all still in the catalog, otherwise prefer
/// [`Planner::get_revert_plan`], which adds them to the pool.
pub fn revert_target(revision: &Profile) -> Arc<Component> {
    let mut builder = Component::builder(
        format!("{REVERT_TARGET_PREFIX}{}", revision.id()),
        Version::new(revision.timestamp(), 0, 0),
    );
    for component in revision.installed() {
        builder = builder.requires(Requirement::one_of([component.key().clone()]));
    }
    builder.build()
}
