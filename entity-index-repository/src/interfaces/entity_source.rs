//! Entity source trait definition.

use async_trait::async_trait;

use crate::errors::IndexError;
use entity_index_shared::{Entity, EntityId, EntityVersion};

/// Read access to the primary entity store.
///
/// The store itself is owned elsewhere; the index core only needs to load an
/// entity at the version named by an index-update request.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Load an entity at a specific version.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(entity))` - The entity as it was at `version`
    /// * `Ok(None)` - The entity does not exist at that version
    /// * `Err(IndexError::SourceError)` - If the store could not be read
    async fn load(
        &self,
        entity_id: &EntityId,
        version: EntityVersion,
    ) -> Result<Option<Entity>, IndexError>;
}
