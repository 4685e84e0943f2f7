// provis-core/src/resolver/conflict.rs
use std::fmt;

use provis_common::model::{ComponentKey, Requirement};
use provis_common::status::Status;
use thiserror::Error;

/// How deep attempt explanations are rendered into the status tree.
pub(super) const MAX_EXPLANATION_DEPTH: usize = 4;

/// Why a candidate could not even be tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Another version of the same id is already selected.
    Singleton {
        candidate: ComponentKey,
        selected: ComponentKey,
    },
    /// A selected component (or an injected requirement) forbids the candidate.
    Excluded {
        candidate: ComponentKey,
        by: Option<ComponentKey>,
        requirement: Requirement,
    },
}

impl Rejection {
    pub fn candidate(&self) -> &ComponentKey {
        match self {
            Rejection::Singleton { candidate, .. } | Rejection::Excluded { candidate, .. } => {
                candidate
            }
        }
    }

    fn to_status(&self) -> Status {
        Status::error(self.to_string()).for_component(self.candidate().clone())
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Singleton {
                candidate,
                selected,
            } => write!(f, "{candidate} cannot be installed together with {selected}"),
            Rejection::Excluded {
                candidate,
                by,
                requirement,
            } => write!(
                f,
                "{candidate} is excluded by {requirement} of {}",
                requirer_label(by.as_ref())
            ),
        }
    }
}

/// Reason a resolution branch failed.
#[derive(Error, Debug, Clone)]
pub enum Conflict {
    #[error("No component satisfies {requirement} required by {}", requirer_label(.requirer.as_ref()))]
    NoProvider {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
    },

    #[error("Every provider of {requirement} required by {} conflicts with the selection", requirer_label(.requirer.as_ref()))]
    Rejected {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
        rejections: Vec<Rejection>,
    },

    #[error("No provider of {requirement} required by {} leads to a consistent installation", requirer_label(.requirer.as_ref()))]
    Exhausted {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
        attempts: Vec<(ComponentKey, Conflict)>,
    },

    #[error("Cannot install {root}: {rejection}")]
    RootConflict {
        root: ComponentKey,
        rejection: Rejection,
    },

    #[error("{requirement} of {} allows at most {allowed} provider(s) in the installation", requirer_label(.requirer.as_ref()))]
    Cardinality {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
        allowed: u32,
        providers: Vec<ComponentKey>,
    },

    #[error("{requirement} of {} needs {needed} provider(s) but only {found} are selected", requirer_label(.requirer.as_ref()))]
    TooFew {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
        needed: u32,
        found: usize,
    },

    #[error("Search budget of {0} attempts exhausted")]
    BudgetExceeded(u64),

    #[error("Resolution canceled")]
    Canceled,
}

pub(crate) fn requirer_label(requirer: Option<&ComponentKey>) -> String {
    match requirer {
        Some(key) => key.to_string(),
        None => "the request".to_string(),
    }
}

impl Conflict {
    /// Conflicts that must abort the whole search instead of one branch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Conflict::BudgetExceeded(_) | Conflict::Canceled)
    }

    /// The component this conflict is primarily about.
    pub fn component(&self) -> Option<&ComponentKey> {
        match self {
            Conflict::NoProvider { requirer, .. }
            | Conflict::Rejected { requirer, .. }
            | Conflict::Exhausted { requirer, .. }
            | Conflict::Cardinality { requirer, .. }
            | Conflict::TooFew { requirer, .. } => requirer.as_ref(),
            Conflict::RootConflict { root, .. } => Some(root),
            Conflict::BudgetExceeded(_) | Conflict::Canceled => None,
        }
    }

    /// Drops attempt explanations nested more than `depth` levels below this one.
    pub(crate) fn pruned(self, depth: usize) -> Conflict {
        match self {
            Conflict::Exhausted {
                requirer,
                requirement,
                attempts,
            } => {
                let attempts = if depth == 0 {
                    Vec::new()
                } else {
                    attempts
                        .into_iter()
                        .map(|(candidate, cause)| (candidate, cause.pruned(depth - 1)))
                        .collect()
                };
                Conflict::Exhausted {
                    requirer,
                    requirement,
                    attempts,
                }
            }
            other => other,
        }
    }

    /// Renders the conflict as a status tree.
    pub fn to_status(&self) -> Status {
        self.to_status_at(0)
    }

    fn to_status_at(&self, depth: usize) -> Status {
        if matches!(self, Conflict::Canceled) {
            return Status::canceled();
        }
        let mut status = Status::error(self.to_string());
        if let Some(key) = self.component() {
            status = status.for_component(key.clone());
        }
        match self {
            Conflict::Rejected { rejections, .. } => {
                for rejection in rejections {
                    status.add_child(rejection.to_status());
                }
            }
            Conflict::Exhausted { attempts, .. } if depth < MAX_EXPLANATION_DEPTH => {
                for (candidate, cause) in attempts {
                    let mut attempt = Status::error(format!("Selecting {candidate} fails"))
                        .for_component(candidate.clone());
                    attempt.add_child(cause.to_status_at(depth + 1));
                    status.add_child(attempt);
                }
            }
            Conflict::RootConflict {
                rejection: Rejection::Singleton { selected, .. },
                ..
            } => {
                status.add_child(
                    Status::error(format!("{selected} conflicts with the requested root"))
                        .for_component(selected.clone()),
                );
            }
            Conflict::Cardinality { providers, .. } => {
                for provider in providers {
                    status.add_child(
                        Status::error(format!("{provider} satisfies the requirement"))
                            .for_component(provider.clone()),
                    );
                }
            }
            _ => {}
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provis_common::model::{Version, VersionRange};
    use provis_common::status::Severity;

    fn key(id: &str, major: u64) -> ComponentKey {
        ComponentKey::new(id, Version::new(major, 0, 0))
    }

    fn nested(depth: usize) -> Conflict {
        let requirement = Requirement::component("x", VersionRange::any());
        if depth == 0 {
            return Conflict::NoProvider {
                requirer: Some(key("leaf", 1)),
                requirement,
            };
        }
        Conflict::Exhausted {
            requirer: Some(key("node", depth as u64)),
            requirement,
            attempts: vec![(key("x", depth as u64), nested(depth - 1))],
        }
    }

    #[test]
    fn explanation_depth_is_bounded() {
        let status = nested(10).to_status();
        let depth = status
            .walk()
            .iter()
            .filter(|s| s.message().starts_with("Selecting"))
            .count();
        assert_eq!(depth, MAX_EXPLANATION_DEPTH);
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn pruning_keeps_what_is_rendered() {
        let selecting = |conflict: &Conflict| {
            conflict
                .to_status()
                .walk()
                .iter()
                .filter(|s| s.message().starts_with("Selecting"))
                .count()
        };
        assert_eq!(selecting(&nested(10).pruned(2)), 2);
        assert_eq!(
            nested(10).pruned(MAX_EXPLANATION_DEPTH).to_status().flatten(),
            nested(10).to_status().flatten()
        );
    }

    #[test]
    fn canceled_renders_as_canceled_status() {
        assert!(Conflict::Canceled.to_status().is_canceled());
        assert!(Conflict::Canceled.is_fatal());
        assert!(!nested(0).is_fatal());
    }

    #[test]
    fn root_conflict_names_both_versions() {
        let conflict = Conflict::RootConflict {
            root: key("a", 2),
            rejection: Rejection::Singleton {
                candidate: key("a", 2),
                selected: key("a", 1),
            },
        };
        let text = conflict.to_status().flatten();
        assert!(text.contains("a 2.0.0"));
        assert!(text.contains("a 1.0.0"));
    }
}
