// provis-common/src/model/component.rs
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::capability::{Capability, Requirement, COMPONENT_NAMESPACE};
use super::version::{Version, VersionRange};
use crate::error::ProvisError;

/// Marks a component as a product; products are protected by the flexer's
/// product invariant.
pub const PROP_PRODUCT: &str = "provis.type.product";
/// Marks a component as a group (a feature-like aggregate).
pub const PROP_GROUP: &str = "provis.type.group";
/// Tie-breaker hint used when several providers have the same version.
pub const PROP_RECOMMENDED: &str = "provis.recommended";

/// Identity of a component. Two components with equal keys are interchangeable.
/// Serialized as `id@version` so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    pub id: String,
    pub version: Version,
}

impl ComponentKey {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Parses `id@version`.
impl FromStr for ComponentKey {
    type Err = ProvisError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (id, version) = s.split_once('@').ok_or_else(|| {
            ProvisError::ParseError("component key", format!("expected 'id@version', got '{s}'"))
        })?;
        Ok(ComponentKey::new(id, Version::parse(version)?))
    }
}

impl Serialize for ComponentKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}@{}", self.id, self.version))
    }
}

impl<'de> Deserialize<'de> for ComponentKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ComponentKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Declares which earlier components this one is an update for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    pub id: String,
    #[serde(default)]
    pub range: VersionRange,
}

impl UpdateDescriptor {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }

    pub fn applies_to(&self, key: &ComponentKey) -> bool {
        self.id == key.id && self.range.includes(&key.version)
    }
}

/// An immutable, versioned unit that provides and requires capabilities.
///
/// Equality, ordering and hashing only look at the [`ComponentKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ComponentSpec", into = "ComponentSpec")]
pub struct Component {
    key: ComponentKey,
    provides: BTreeSet<Capability>,
    requires: BTreeSet<Requirement>,
    properties: BTreeMap<String, String>,
    update_descriptor: Option<UpdateDescriptor>,
    singleton: bool,
}

impl Component {
    pub fn builder(id: impl Into<String>, version: Version) -> ComponentBuilder {
        ComponentBuilder::new(id, version)
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn version(&self) -> &Version {
        &self.key.version
    }

    /// Provided capabilities, including the implicit identity capability.
    pub fn provides(&self) -> impl Iterator<Item = &Capability> {
        self.provides.iter()
    }

    pub fn requires(&self) -> impl Iterator<Item = &Requirement> {
        self.requires.iter()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.property(key) == Some("true")
    }

    pub fn update_descriptor(&self) -> Option<&UpdateDescriptor> {
        self.update_descriptor.as_ref()
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// True when this component declares itself an update of `other` and is newer.
    pub fn is_update_of(&self, other: &ComponentKey) -> bool {
        self.update_descriptor
            .as_ref()
            .is_some_and(|d| d.applies_to(other))
            && self.key.version > other.version
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Component {}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl Hash for Component {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Components order and hash by key, so sets of them can be searched by key.
impl Borrow<ComponentKey> for Arc<Component> {
    fn borrow(&self) -> &ComponentKey {
        &self.key
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    key: ComponentKey,
    provides: BTreeSet<Capability>,
    requires: BTreeSet<Requirement>,
    properties: BTreeMap<String, String>,
    update_descriptor: Option<UpdateDescriptor>,
    singleton: bool,
}

impl ComponentBuilder {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            key: ComponentKey::new(id, version),
            provides: BTreeSet::new(),
            requires: BTreeSet::new(),
            properties: BTreeMap::new(),
            update_descriptor: None,
            singleton: true,
        }
    }

    pub fn provides(mut self, capability: Capability) -> Self {
        self.provides.insert(capability);
        self
    }

    pub fn provides_capability(
        self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: Version,
    ) -> Self {
        self.provides(Capability::new(namespace, name, version))
    }

    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requires.insert(requirement);
        self
    }

    /// Shorthand for a mandatory requirement on another component id.
    pub fn requires_component(self, id: impl Into<String>, range: VersionRange) -> Self {
        self.requires(Requirement::component(id, range))
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn update_from(mut self, id: impl Into<String>, range: VersionRange) -> Self {
        self.update_descriptor = Some(UpdateDescriptor::new(id, range));
        self
    }

    /// Allows several versions of this id to coexist.
    pub fn multi_version(mut self) -> Self {
        self.singleton = false;
        self
    }

    pub fn build(self) -> Arc<Component> {
        Arc::new(self.build_owned())
    }

    fn build_owned(mut self) -> Component {
        self.provides.insert(Capability::new(
            COMPONENT_NAMESPACE,
            self.key.id.clone(),
            self.key.version.clone(),
        ));
        Component {
            key: self.key,
            provides: self.provides,
            requires: self.requires,
            properties: self.properties,
            update_descriptor: self.update_descriptor,
            singleton: self.singleton,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Serialized shape of a component in catalog and profile snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ComponentSpec {
    id: String,
    version: Version,
    #[serde(default)]
    provides: Vec<Capability>,
    #[serde(default)]
    requires: Vec<Requirement>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    update_from: Option<UpdateDescriptor>,
    #[serde(default = "default_true")]
    singleton: bool,
}

impl From<ComponentSpec> for Component {
    fn from(spec: ComponentSpec) -> Self {
        let mut builder = ComponentBuilder::new(spec.id, spec.version);
        builder.provides.extend(spec.provides);
        builder.requires.extend(spec.requires);
        builder.properties = spec.properties;
        builder.update_descriptor = spec.update_from;
        builder.singleton = spec.singleton;
        builder.build_owned()
    }
}

impl From<Component> for ComponentSpec {
    fn from(component: Component) -> Self {
        let identity = Capability::new(
            COMPONENT_NAMESPACE,
            component.key.id.clone(),
            component.key.version.clone(),
        );
        ComponentSpec {
            provides: component
                .provides
                .into_iter()
                .filter(|cap| *cap != identity)
                .collect(),
            requires: component.requires.into_iter().collect(),
            properties: component.properties,
            update_from: component.update_descriptor,
            singleton: component.singleton,
            id: component.key.id,
            version: component.key.version,
        }
    }
}
