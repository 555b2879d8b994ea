//! Entity identity, version and property model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable address of one logical entity across its version history.
///
/// Identities are never reused across distinct logical entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    /// The entity's unique identifier.
    pub uuid: Uuid,
    /// The entity's type name (e.g. `"user"`, `"widget"`).
    pub entity_type: String,
}

impl EntityId {
    /// Create a new identity from a uuid and a type name.
    pub fn new(uuid: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            uuid,
            entity_type: entity_type.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.uuid)
    }
}

/// Version stamp attached to every mutation of an entity.
///
/// Versions are totally ordered per identity; two mutations with different
/// content never share a version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityVersion(pub u64);

impl EntityVersion {
    /// The raw version number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An entity as read from the primary store at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity's identity.
    pub id: EntityId,
    /// The version this snapshot was read at.
    pub version: EntityVersion,
    /// The full property map.
    pub fields: BTreeMap<String, Value>,
}

impl Entity {
    /// Create an entity with no properties.
    pub fn new(id: EntityId, version: EntityVersion) -> Self {
        Self {
            id,
            version,
            fields: BTreeMap::new(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up a property by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}
