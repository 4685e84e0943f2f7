// provis-core/src/flexer.rs
//! Retries an over-constrained request with loosened constraints.
//!
//! The flexer rewrites every requested addition (and, when allowed, every
//! installed root) into a `OneOf` requirement over acceptable alternatives,
//! lets the planner resolve that, and reads a concrete request back out of the
//! resulting future state. It never fails: "no alternative" is `None`.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bitflags::bitflags;
use provis_common::cancel::CancellationToken;
use provis_common::model::component::PROP_PRODUCT;
use provis_common::model::{
    Component, ComponentKey, Operand, Profile, ProfileChangeRequest, ProvisioningPlan, Requirement,
};
use provis_common::query::{component, Queryable};
use tracing::debug;

use crate::planner::Planner;

bitflags! {
    /// Which constraints the flexer may relax.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlexFlags: u8 {
        /// Accept other catalog versions of a requested component.
        const VERSION = 1;
        /// Accept declared updates of a requested component.
        const UPDATES = 1 << 1;
        /// Allow requested components to be left out.
        const PARTIAL_INSTALL = 1 << 2;
        /// Allow installed roots to move to one of their updates.
        const INSTALLED_CHANGE = 1 << 3;
        /// Allow installed roots to be removed.
        const INSTALLED_REMOVAL = 1 << 4;
    }
}

/// What the flexer needs from a planner.
pub trait PlanProvider {
    fn get_provisioning_plan(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan;

    fn updates_for(
        &self,
        component: &Component,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<Component>>;
}

impl PlanProvider for Planner {
    fn get_provisioning_plan(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> ProvisioningPlan {
        Planner::get_provisioning_plan(self, request, profile, catalog, cancel)
    }

    fn updates_for(
        &self,
        component: &Component,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<Component>> {
        Planner::updates_for(self, component, catalog, cancel)
    }
}

/// Where a loosened requirement came from.
enum Origin {
    Added(Arc<Component>),
    Installed(Arc<Component>),
}

pub struct RequestFlexer<'a> {
    planner: &'a dyn PlanProvider,
    flags: FlexFlags,
    ensure_product: bool,
}

impl<'a> RequestFlexer<'a> {
    pub fn new(planner: &'a dyn PlanProvider, flags: FlexFlags) -> Self {
        Self {
            planner,
            flags,
            ensure_product: true,
        }
    }

    /// Whether a plan that loses an installed product is rejected. On by default.
    pub fn ensure_product(mut self, enabled: bool) -> Self {
        self.ensure_product = enabled;
        self
    }

    pub fn flags(&self) -> FlexFlags {
        self.flags
    }

    pub fn get_changed_request(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> Option<ProfileChangeRequest> {
        if self.flags.is_empty() {
            debug!("All flex flags are off, not retrying");
            return None;
        }
        if cancel.is_canceled() {
            return None;
        }

        let (loosened, origins) = self.loosen(request, profile, catalog, cancel);
        if cancel.is_canceled() {
            return None;
        }
        let plan = self
            .planner
            .get_provisioning_plan(&loosened, profile, catalog, cancel);
        if !plan.is_success() {
            debug!("Loosened request did not resolve: {}", plan.status());
            return None;
        }
        if plan.is_empty() {
            debug!("Loosened request changes nothing");
            return None;
        }
        if self.ensure_product && loses_product(&plan, profile) {
            debug!("Loosened request would remove an installed product");
            return None;
        }

        let changed = self.reconstruct(request, profile, &plan, origins);
        if changed.to_add.is_empty() && changed.to_remove.is_empty() {
            debug!("Flexed request is a no-op");
            return None;
        }
        if changed == *request {
            debug!("Flexed request equals the original request");
            return None;
        }
        Some(changed)
    }

    /// Steps 1 and 2: a `OneOf` per requested addition and per changeable root.
    fn loosen(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        catalog: &dyn Queryable<Arc<Component>>,
        cancel: &CancellationToken,
    ) -> (ProfileChangeRequest, Vec<(Requirement, Origin)>) {
        let mut loosened = ProfileChangeRequest::new(request.profile_id.clone());
        loosened.property_adds = request.property_adds.clone();
        loosened.property_removes = request.property_removes.clone();
        loosened.extra_requirements = request.extra_requirements.clone();
        loosened.remove_all(request.to_remove.iter().cloned());
        let mut origins = Vec::new();

        for added in &request.to_add {
            let mut alternatives: BTreeSet<ComponentKey> = BTreeSet::new();
            alternatives.insert(added.key().clone());
            if self.flags.contains(FlexFlags::VERSION) {
                let same_id = catalog.query(&component::by_id(added.id()), cancel);
                alternatives.extend(same_id.iter().map(|c| c.key().clone()));
            }
            if self.flags.contains(FlexFlags::UPDATES) {
                let updates = self.planner.updates_for(added, catalog, cancel);
                alternatives.extend(updates.iter().map(|c| c.key().clone()));
            }
            let optional = self.flags.contains(FlexFlags::PARTIAL_INSTALL)
                || request.is_optional_inclusion(added.key());
            let requirement = Requirement::one_of(alternatives).with_optional(optional);
            loosened.add_extra_requirement(requirement.clone());
            origins.push((requirement, Origin::Added(Arc::clone(added))));
        }

        if self
            .flags
            .intersects(FlexFlags::INSTALLED_CHANGE | FlexFlags::INSTALLED_REMOVAL)
        {
            let optional = self
                .flags
                .intersects(FlexFlags::INSTALLED_REMOVAL | FlexFlags::PARTIAL_INSTALL);
            for root in profile.roots() {
                if request.to_remove.contains(&root) {
                    continue;
                }
                let mut alternatives: BTreeSet<ComponentKey> = BTreeSet::new();
                alternatives.insert(root.key().clone());
                let updates = self.planner.updates_for(&root, catalog, cancel);
                alternatives.extend(updates.iter().map(|c| c.key().clone()));
                let requirement = Requirement::one_of(alternatives).with_optional(optional);
                loosened.remove(Arc::clone(&root));
                loosened.add_extra_requirement(requirement.clone());
                origins.push((requirement, Origin::Installed(root)));
            }
        }
        (loosened, origins)
    }

    /// Step 5: one winner per loosened requirement, properties re-attached.
    fn reconstruct(
        &self,
        request: &ProfileChangeRequest,
        profile: &Profile,
        plan: &ProvisioningPlan,
        origins: Vec<(Requirement, Origin)>,
    ) -> ProfileChangeRequest {
        let mut changed = ProfileChangeRequest::new(request.profile_id.clone());
        changed.property_adds = request.property_adds.clone();
        changed.property_removes = request.property_removes.clone();
        changed.extra_requirements = request.extra_requirements.clone();
        changed.remove_all(request.to_remove.iter().cloned());

        for (requirement, origin) in origins {
            let winner = plan
                .future_state()
                .iter()
                .filter(|c| requirement.is_satisfied_by(c))
                .max_by(|a, b| a.version().cmp(b.version()).then_with(|| a.key().cmp(b.key())))
                .cloned();
            match origin {
                Origin::Added(original) => {
                    let Some(winner) = winner else {
                        debug!("Leaving out {}", original.key());
                        continue;
                    };
                    let props = merged_properties(None, request, original.key());
                    for (key, value) in props {
                        changed.set_component_property(winner.key(), key, value);
                    }
                    changed.add(winner);
                }
                Origin::Installed(root) => match winner {
                    Some(winner) if winner.key() == root.key() => {}
                    Some(winner) => {
                        let props = merged_properties(
                            profile.component_properties(root.key()),
                            request,
                            root.key(),
                        );
                        for (key, value) in props {
                            changed.set_component_property(winner.key(), key, value);
                        }
                        changed.remove(root);
                        changed.add(winner);
                    }
                    None => changed.remove(root),
                },
            }
        }

        let both: Vec<Arc<Component>> = changed
            .to_add
            .intersection(&changed.to_remove)
            .cloned()
            .collect();
        for component in both {
            changed.to_add.remove(&component);
            changed.to_remove.remove(&component);
        }
        let already: Vec<Arc<Component>> = changed
            .to_add
            .iter()
            .filter(|c| profile.is_installed(c.key()))
            .cloned()
            .collect();
        for component in already {
            changed.to_add.remove(&component);
            changed.component_property_adds.remove(component.key());
        }
        changed
    }
}

/// `base` minus what the request removes for `key`, plus what it adds.
fn merged_properties(
    base: Option<&BTreeMap<String, String>>,
    request: &ProfileChangeRequest,
    key: &ComponentKey,
) -> BTreeMap<String, String> {
    let mut props = base.cloned().unwrap_or_default();
    if let Some(removed) = request.component_property_removes.get(key) {
        props.retain(|k, _| !removed.contains(k));
    }
    if let Some(added) = request.component_property_adds.get(key) {
        props.extend(added.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    props
}

/// True when an installed product has no component of the same id afterwards.
fn loses_product(plan: &ProvisioningPlan, profile: &Profile) -> bool {
    let removed_products = plan
        .operands()
        .iter()
        .filter_map(|op| match op {
            Operand::Remove(c) => Some(c),
            _ => None,
        })
        .filter(|c| c.has_flag(PROP_PRODUCT) && profile.is_installed(c.key()));
    for product in removed_products {
        if !plan.future_state().iter().any(|c| c.id() == product.id()) {
            return true;
        }
    }
    false
}
