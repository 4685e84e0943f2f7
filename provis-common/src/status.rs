// provis-common/src/status.rs
//! Hierarchical outcome of a resolution.
//!
//! A single resolution can fail for several independent reasons at once, so
//! outcomes are a tree of [`Status`] nodes rather than an early-returned error.
//! The severity of a node built with [`Status::multi`] is the highest severity
//! among its children.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProvisError;
use crate::model::ComponentKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
    Canceled,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Canceled => "CANCELED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct Status {
    severity: Severity,
    message: String,
    children: Vec<Status>,
    cause: Option<Arc<ProvisError>>,
    component: Option<ComponentKey>,
}

impl Status {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            children: Vec::new(),
            cause: None,
            component: None,
        }
    }

    pub fn ok() -> Self {
        Self::with_severity(Severity::Ok, "OK")
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Ok, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    pub fn canceled() -> Self {
        Self::with_severity(Severity::Canceled, "Operation canceled")
    }

    /// A parent node whose severity is the maximum of its children (OK when empty).
    pub fn multi(message: impl Into<String>, children: Vec<Status>) -> Self {
        let severity = children
            .iter()
            .map(Status::severity)
            .max()
            .unwrap_or(Severity::Ok);
        Self {
            severity,
            message: message.into(),
            children,
            cause: None,
            component: None,
        }
    }

    pub fn with_cause(mut self, cause: ProvisError) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Tags the status with the component it is about.
    pub fn for_component(mut self, key: ComponentKey) -> Self {
        self.component = Some(key);
        self
    }

    pub fn add_child(&mut self, child: Status) {
        self.severity = self.severity.max(child.severity);
        self.children.push(child);
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn children(&self) -> &[Status] {
        &self.children
    }

    pub fn cause(&self) -> Option<&ProvisError> {
        self.cause.as_deref()
    }

    pub fn component(&self) -> Option<&ComponentKey> {
        self.component.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    /// OK or INFO: the plan can proceed.
    pub fn is_success(&self) -> bool {
        self.severity <= Severity::Info
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_canceled(&self) -> bool {
        self.severity == Severity::Canceled
    }

    /// ERROR or CANCELED: nothing produced alongside this status may be used.
    pub fn is_failure(&self) -> bool {
        self.severity >= Severity::Error
    }

    /// Depth-first walk over this node and all descendants.
    pub fn walk(&self) -> Vec<&Status> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Renders the tree as indented text, one node per line, causes included.
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        self.flatten_into(&mut out, 0);
        out
    }

    fn flatten_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{indent}{}: {}\n", self.severity, self.message));
        if let Some(cause) = &self.cause {
            out.push_str(&format!("{indent}  caused by: {cause}\n"));
        }
        for child in &self.children {
            child.flatten_into(out, depth + 1);
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_takes_highest_child_severity() {
        let status = Status::multi(
            "Resolution",
            vec![Status::info("a"), Status::error("b"), Status::warning("c")],
        );
        assert_eq!(status.severity(), Severity::Error);
        assert!(status.is_failure());
        assert_eq!(Status::multi("empty", vec![]).severity(), Severity::Ok);
    }

    #[test]
    fn add_child_raises_severity() {
        let mut status = Status::ok_with("plan");
        status.add_child(Status::warning("already installed"));
        assert_eq!(status.severity(), Severity::Warning);
        assert!(!status.is_success());
    }

    #[test]
    fn flatten_indents_children_and_causes() {
        let status = Status::multi(
            "Cannot complete the request",
            vec![Status::error("Missing b").with_cause(ProvisError::NotFound("b".into()))],
        );
        let text = status.flatten();
        assert_eq!(
            text,
            "ERROR: Cannot complete the request\n  ERROR: Missing b\n    caused by: Resource Not Found: b\n"
        );
    }
}
