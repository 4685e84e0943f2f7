// provis-common/src/lib.rs
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod registry;
pub mod status;

// Re-export key types
pub use cancel::CancellationToken;
pub use catalog::Catalog;
pub use config::Config;
pub use error::{ProvisError, Result};
pub use model::{
    Capability, Component, ComponentKey, Operand, Profile, ProfileChangeRequest,
    PropertyOperand, ProvisioningPlan, Requirement, RequirementMatch, Version, VersionRange,
};
pub use query::{CompoundQueryable, Query, QueryResult, Queryable};
pub use registry::ProfileRegistry;
pub use status::{Severity, Status};
