// provis-core/src/analyzer.rs
//! Answers "what went wrong" questions about a finished plan.
use std::collections::BTreeSet;
use std::sync::Arc;

use provis_common::model::{Component, ComponentKey, ProvisioningPlan};
use provis_common::status::{Severity, Status};

/// A read-only view over a plan's status tree and originating request.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    status: Status,
    requested: BTreeSet<Arc<Component>>,
    future_state: BTreeSet<Arc<Component>>,
}

impl ResolutionResult {
    pub fn from_plan(plan: &ProvisioningPlan) -> Self {
        Self {
            status: plan.status().clone(),
            requested: plan.request().to_add.clone(),
            future_state: plan.future_state().clone(),
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The whole status tree as indented text.
    pub fn summary(&self) -> String {
        self.status.flatten()
    }

    /// Everything the status tree says about `key`, one line per tagged node.
    ///
    /// A requested component that a successful plan left out is reported even
    /// when no node is tagged with it.
    pub fn detail_for(&self, key: &ComponentKey) -> Option<String> {
        let lines: Vec<String> = self
            .status
            .walk()
            .into_iter()
            .filter(|s| s.component() == Some(key))
            .map(|s| s.to_string())
            .collect();
        if !lines.is_empty() {
            return Some(lines.join("\n"));
        }
        if self.status.is_success()
            && self.requested.iter().any(|c| c.key() == key)
            && !self.future_state.iter().any(|c| c.key() == key)
        {
            return Some(format!(
                "{}: {key} was requested but left out of the plan",
                Severity::Info
            ));
        }
        None
    }

    /// Keys of components that some ERROR node is tagged with, in key order.
    pub fn conflicting_components(&self) -> Vec<ComponentKey> {
        let keys: BTreeSet<ComponentKey> = self
            .status
            .walk()
            .into_iter()
            .filter(|s| s.severity() == Severity::Error)
            .filter_map(|s| s.component().cloned())
            .collect();
        keys.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provis_common::model::{ProfileChangeRequest, Version};

    fn key(id: &str) -> ComponentKey {
        ComponentKey::new(id, Version::new(1, 0, 0))
    }

    #[test]
    fn collects_error_tagged_keys() {
        let mut status = Status::error("Cannot complete the request");
        status.add_child(Status::error("b is excluded").for_component(key("b")));
        status.add_child(Status::info("a was left out").for_component(key("a")));
        let plan = ProvisioningPlan::failed(status, ProfileChangeRequest::new("p"));
        let result = ResolutionResult::from_plan(&plan);
        assert_eq!(result.conflicting_components(), vec![key("b")]);
        assert_eq!(result.detail_for(&key("a")).as_deref(), Some("INFO: a was left out"));
        assert!(result.detail_for(&key("zzz")).is_none());
    }
}
