// provis-core/src/lib.rs

pub mod analyzer;
pub mod flexer;
pub mod ordering;
pub mod planner;
pub mod resolver;

// Re-export key types for easier use by the CLI crate
pub use analyzer::ResolutionResult;
pub use flexer::{FlexFlags, PlanProvider, RequestFlexer};
pub use planner::{revert_target, Planner, PlannerOptions};
pub use resolver::{ClosureResolver, Recommendation, Resolution, ResolutionInput, RootSpec};
