//! Versioned in-memory entity store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::errors::IndexError;
use crate::interfaces::EntitySource;
use entity_index_shared::{Entity, EntityId, EntityVersion};

#[derive(Debug, Clone)]
enum StoredVersion {
    Present(Entity),
    Deleted,
}

/// Entity store keeping every version of every entity.
#[derive(Default)]
pub struct InMemoryEntityStore {
    versions: Mutex<HashMap<EntityId, BTreeMap<EntityVersion, StoredVersion>>>,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity snapshot at its version.
    pub fn put(&self, entity: Entity) {
        let mut versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        versions
            .entry(entity.id.clone())
            .or_default()
            .insert(entity.version, StoredVersion::Present(entity));
    }

    /// Record the deletion of an entity at a version.
    pub fn remove(&self, entity_id: &EntityId, version: EntityVersion) {
        let mut versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        versions
            .entry(entity_id.clone())
            .or_default()
            .insert(version, StoredVersion::Deleted);
    }
}

#[async_trait]
impl EntitySource for InMemoryEntityStore {
    async fn load(
        &self,
        entity_id: &EntityId,
        version: EntityVersion,
    ) -> Result<Option<Entity>, IndexError> {
        let versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);

        let entity = versions
            .get(entity_id)
            .and_then(|history| history.get(&version))
            .and_then(|stored| match stored {
                StoredVersion::Present(entity) => Some(entity.clone()),
                StoredVersion::Deleted => None,
            });

        Ok(entity)
    }
}
