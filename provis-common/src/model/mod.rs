// provis-common/src/model/mod.rs
// Declares the modules within the model directory.
pub mod capability;
pub mod component;
pub mod plan;
pub mod profile;
pub mod request;
pub mod version;

// Re-export
pub use capability::{Capability, Requirement, RequirementMatch, COMPONENT_NAMESPACE};
pub use component::{Component, ComponentBuilder, ComponentKey, UpdateDescriptor};
pub use plan::{Operand, PropertyOperand, ProvisioningPlan};
pub use profile::Profile;
pub use request::ProfileChangeRequest;
pub use version::{Version, VersionRange};
