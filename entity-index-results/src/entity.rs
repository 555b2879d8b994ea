//! Flattened property-bag entities handed to result consumers.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use entity_index_shared::Entity;

/// An entity as a flat map of properties, addressed by uuid and type.
///
/// Built by copying a source [`Entity`]; it keeps no link back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyEntity {
    uuid: Uuid,
    entity_type: String,
    properties: BTreeMap<String, Value>,
}

impl LegacyEntity {
    /// Create an entity shell with no properties.
    pub fn new(uuid: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            uuid,
            entity_type: entity_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Set a property, replacing any previous value.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Copy every entry of `properties` onto this entity.
    pub fn add_properties<'a>(&mut self, properties: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (name, value) in properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }
}

impl From<&Entity> for LegacyEntity {
    fn from(entity: &Entity) -> Self {
        let mut legacy = LegacyEntity::new(entity.id.uuid, entity.id.entity_type.clone());
        legacy.add_properties(&entity.fields);
        legacy
    }
}
