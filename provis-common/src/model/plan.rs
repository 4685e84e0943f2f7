// provis-common/src/model/plan.rs
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::component::{Component, ComponentKey};
use super::request::ProfileChangeRequest;
use crate::status::Status;

/// A change to a profile property or to a per-component property.
/// `None` on either side means the property is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyOperand {
    Profile {
        key: String,
        old: Option<String>,
        new: Option<String>,
    },
    Component {
        component: ComponentKey,
        key: String,
        old: Option<String>,
        new: Option<String>,
    },
}

impl fmt::Display for PropertyOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("<unset>")
        }
        match self {
            PropertyOperand::Profile { key, old, new } => {
                write!(f, "* {key}: {} -> {}", show(old), show(new))
            }
            PropertyOperand::Component {
                component,
                key,
                old,
                new,
            } => write!(f, "* [{component}] {key}: {} -> {}", show(old), show(new)),
        }
    }
}

/// One atomic instruction of a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Add(Arc<Component>),
    Remove(Arc<Component>),
    Update {
        from: Arc<Component>,
        to: Arc<Component>,
    },
    Property(PropertyOperand),
}

impl Operand {
    /// The component this operand leaves installed, if any.
    pub fn added(&self) -> Option<&Arc<Component>> {
        match self {
            Operand::Add(c) => Some(c),
            Operand::Update { to, .. } => Some(to),
            _ => None,
        }
    }

    /// The component this operand takes away, if any.
    pub fn removed(&self) -> Option<&Arc<Component>> {
        match self {
            Operand::Remove(c) => Some(c),
            Operand::Update { from, .. } => Some(from),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Add(c) => write!(f, "+ {} {}", c.id(), c.version()),
            Operand::Remove(c) => write!(f, "- {} {}", c.id(), c.version()),
            Operand::Update { from, to } => {
                write!(f, "~ {} {} -> {}", from.id(), from.version(), to.version())
            }
            Operand::Property(p) => write!(f, "{p}"),
        }
    }
}

/// The result of one planner call. Immutable once built.
///
/// A plan whose status is ERROR or CANCELED never exposes operands or a future state.
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    status: Status,
    request: ProfileChangeRequest,
    operands: Vec<Operand>,
    property_operands: Vec<PropertyOperand>,
    future_state: BTreeSet<Arc<Component>>,
}

impl ProvisioningPlan {
    pub fn new(
        status: Status,
        request: ProfileChangeRequest,
        operands: Vec<Operand>,
        property_operands: Vec<PropertyOperand>,
        future_state: BTreeSet<Arc<Component>>,
    ) -> Self {
        if status.is_failure() {
            return Self::failed(status, request);
        }
        Self {
            status,
            request,
            operands,
            property_operands,
            future_state,
        }
    }

    /// A plan carrying only a status, no operands.
    pub fn failed(status: Status, request: ProfileChangeRequest) -> Self {
        Self {
            status,
            request,
            operands: Vec::new(),
            property_operands: Vec::new(),
            future_state: BTreeSet::new(),
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn request(&self) -> &ProfileChangeRequest {
        &self.request
    }

    /// Component operands in execution order.
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn property_operands(&self) -> &[PropertyOperand] {
        &self.property_operands
    }

    /// Component operands followed by property operands.
    pub fn all_operands(&self) -> impl Iterator<Item = Operand> + '_ {
        self.operands.iter().cloned().chain(
            self.property_operands
                .iter()
                .cloned()
                .map(Operand::Property),
        )
    }

    /// The installed set the profile will have after this plan is applied.
    pub fn future_state(&self) -> &BTreeSet<Arc<Component>> {
        &self.future_state
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// True when applying the plan would not change any installed component.
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }
}
