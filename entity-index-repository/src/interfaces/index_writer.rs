//! Index writer trait definition.
//!
//! This module defines the abstract interface for search index mutations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::IndexError;
use crate::types::WriteOutcome;
use entity_index_shared::{Entity, EntityId, EntityVersion};

/// Abstract interface for search index mutations.
///
/// # Idempotence
///
/// Every write is addressed by `(identity, version)` and must be safe to
/// invoke more than once. When writes for the same identity arrive out of
/// order, implementations keep the highest version and report lower or equal
/// versions as [`WriteOutcome::Stale`]. Arrival order never decides.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks
/// and concurrent queue consumers.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Index an entity at its version.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Applied)` - The document now reflects this version
    /// * `Ok(WriteOutcome::Stale)` - An equal or higher version is already indexed
    /// * `Err(IndexError)` - If the write fails
    async fn upsert(&self, entity: &Entity) -> Result<WriteOutcome, IndexError>;

    /// Remove an entity's document as of `version`.
    ///
    /// The deletion is versioned: an upsert with a lower version arriving
    /// afterwards must not bring the document back.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Applied)` - The document was removed
    /// * `Ok(WriteOutcome::Stale)` - A higher version is already indexed
    /// * `Ok(WriteOutcome::Skipped)` - There was no document to remove
    /// * `Err(IndexError)` - If the deletion fails
    async fn delete(
        &self,
        entity_id: &EntityId,
        version: EntityVersion,
    ) -> Result<WriteOutcome, IndexError>;

    /// Ensure the search index exists with proper mappings.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self) -> Result<(), IndexError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, IndexError>;
}
