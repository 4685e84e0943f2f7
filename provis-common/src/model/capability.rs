// provis-common/src/model/capability.rs
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::component::{Component, ComponentKey};
use super::version::{Version, VersionRange};

/// Namespace of the capability every component provides for its own identity.
pub const COMPONENT_NAMESPACE: &str = "provis.component";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
}

impl Capability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.version)
    }
}

/// What a requirement is looking for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementMatch {
    /// Any capability in `namespace`/`name` whose version lies in `range`.
    Capability {
        namespace: String,
        name: String,
        #[serde(default)]
        range: VersionRange,
    },
    /// Any one of an explicit list of components.
    OneOf(BTreeSet<ComponentKey>),
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "match")]
    pub matcher: RequirementMatch,
    #[serde(default = "default_one")]
    pub min_occurs: u32,
    #[serde(default = "default_one")]
    pub max_occurs: u32,
    #[serde(default)]
    pub optional: bool,
}

impl Requirement {
    pub fn capability(
        namespace: impl Into<String>,
        name: impl Into<String>,
        range: VersionRange,
    ) -> Self {
        Self {
            matcher: RequirementMatch::Capability {
                namespace: namespace.into(),
                name: name.into(),
                range,
            },
            min_occurs: 1,
            max_occurs: 1,
            optional: false,
        }
    }

    /// A requirement on another component by id.
    pub fn component(id: impl Into<String>, range: VersionRange) -> Self {
        Self::capability(COMPONENT_NAMESPACE, id, range)
    }

    pub fn one_of<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = ComponentKey>,
    {
        Self {
            matcher: RequirementMatch::OneOf(keys.into_iter().collect()),
            min_occurs: 1,
            max_occurs: 1,
            optional: false,
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        if optional {
            self.min_occurs = 0;
        }
        self
    }

    pub fn with_occurrences(mut self, min: u32, max: u32) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Negative requirement: nothing in the closure may satisfy it.
    pub fn conflicts_with(mut self) -> Self {
        self.min_occurs = 0;
        self.max_occurs = 0;
        self.optional = true;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional || self.min_occurs == 0
    }

    pub fn is_negative(&self) -> bool {
        self.max_occurs == 0
    }

    pub fn matches_capability(&self, capability: &Capability) -> bool {
        match &self.matcher {
            RequirementMatch::Capability {
                namespace,
                name,
                range,
            } => {
                capability.namespace == *namespace
                    && capability.name == *name
                    && range.includes(&capability.version)
            }
            RequirementMatch::OneOf(keys) => {
                capability.namespace == COMPONENT_NAMESPACE
                    && keys.iter().any(|k| k.id == capability.name && k.version == capability.version)
            }
        }
    }

    pub fn is_satisfied_by(&self, component: &Component) -> bool {
        match &self.matcher {
            RequirementMatch::OneOf(keys) => keys.contains(component.key()),
            RequirementMatch::Capability { .. } => {
                component.provides().any(|cap| self.matches_capability(cap))
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            RequirementMatch::Capability {
                namespace,
                name,
                range,
            } => write!(f, "{namespace}/{name} {range}")?,
            RequirementMatch::OneOf(keys) => {
                let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                write!(f, "one of [{}]", names.join(", "))?
            }
        }
        if self.is_negative() {
            write!(f, " (must be absent)")
        } else if self.is_optional() {
            write!(f, " (optional)")
        } else {
            Ok(())
        }
    }
}
