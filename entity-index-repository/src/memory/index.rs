//! In-memory search index.
//!
//! Keeps one slot per entity identity holding either the indexed document or
//! a versioned tombstone, and applies the highest-version-wins rule.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::errors::IndexError;
use crate::interfaces::IndexWriter;
use crate::types::WriteOutcome;
use entity_index_shared::{Entity, EntityId, EntityVersion};

/// A document as stored in the in-memory index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// The indexed entity.
    pub entity_id: EntityId,
    /// The entity version this document reflects.
    pub version: EntityVersion,
    /// Indexed properties.
    pub fields: BTreeMap<String, Value>,
    /// When this version was first written.
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Slot {
    Document(IndexedDocument),
    Tombstone(EntityVersion),
}

impl Slot {
    fn version(&self) -> EntityVersion {
        match self {
            Slot::Document(doc) => doc.version,
            Slot::Tombstone(version) => *version,
        }
    }
}

/// Thread-safe in-memory index writer.
#[derive(Default)]
pub struct InMemoryIndex {
    slots: Mutex<HashMap<EntityId, Slot>>,
    writes: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl InMemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with a connection error.
    ///
    /// Simulates an unavailable index backend.
    pub fn fail_next_writes(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// The currently indexed document for an identity, if any.
    pub fn document(&self, entity_id: &EntityId) -> Option<IndexedDocument> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(entity_id) {
            Some(Slot::Document(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    /// The highest version seen for an identity, including deletions.
    pub fn version_of(&self, entity_id: &EntityId) -> Option<EntityVersion> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(entity_id).map(Slot::version)
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Document(_)))
            .count()
    }

    /// Whether the index holds no live documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of write and delete calls received, including stale and failed ones.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), IndexError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(IndexError::connection("in-memory index unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexWriter for InMemoryIndex {
    async fn upsert(&self, entity: &Entity) -> Result<WriteOutcome, IndexError> {
        self.check_available()?;

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slots.get(&entity.id) {
            if existing.version() >= entity.version {
                debug!(
                    entity_id = %entity.id,
                    version = %entity.version,
                    indexed_version = %existing.version(),
                    "Ignoring stale upsert"
                );
                return Ok(WriteOutcome::Stale);
            }
        }

        slots.insert(
            entity.id.clone(),
            Slot::Document(IndexedDocument {
                entity_id: entity.id.clone(),
                version: entity.version,
                fields: entity.fields.clone(),
                indexed_at: Utc::now(),
            }),
        );
        Ok(WriteOutcome::Applied)
    }

    async fn delete(
        &self,
        entity_id: &EntityId,
        version: EntityVersion,
    ) -> Result<WriteOutcome, IndexError> {
        self.check_available()?;

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = match slots.get(entity_id) {
            Some(existing) if existing.version() >= version => WriteOutcome::Stale,
            Some(Slot::Document(_)) => WriteOutcome::Applied,
            Some(Slot::Tombstone(_)) | None => WriteOutcome::Skipped,
        };

        // A tombstone is recorded even when nothing was indexed yet, so an
        // older upsert delivered later cannot resurrect the entity.
        if outcome != WriteOutcome::Stale {
            slots.insert(entity_id.clone(), Slot::Tombstone(version));
        }
        Ok(outcome)
    }

    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entity(id: &EntityId, version: u64, color: &str) -> Entity {
        Entity::new(id.clone(), EntityVersion(version)).with_field("color", color)
    }

    #[tokio::test]
    async fn test_higher_version_wins_regardless_of_arrival_order() {
        let index = InMemoryIndex::new();
        let id = EntityId::new(Uuid::new_v4(), "widget");

        assert_eq!(index.upsert(&entity(&id, 2, "blue")).await.unwrap(), WriteOutcome::Applied);
        assert_eq!(index.upsert(&entity(&id, 1, "red")).await.unwrap(), WriteOutcome::Stale);

        let doc = index.document(&id).unwrap();
        assert_eq!(doc.version, EntityVersion(2));
        assert_eq!(doc.fields["color"], "blue");
    }

    #[tokio::test]
    async fn test_duplicate_upsert_leaves_same_state() {
        let index = InMemoryIndex::new();
        let id = EntityId::new(Uuid::new_v4(), "widget");

        index.upsert(&entity(&id, 1, "red")).await.unwrap();
        let once = index.document(&id);
        index.upsert(&entity(&id, 1, "red")).await.unwrap();

        assert_eq!(index.document(&id), once);
        assert_eq!(index.write_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_tombstone_blocks_older_upsert() {
        let index = InMemoryIndex::new();
        let id = EntityId::new(Uuid::new_v4(), "widget");

        assert_eq!(
            index.delete(&id, EntityVersion(5)).await.unwrap(),
            WriteOutcome::Skipped
        );
        assert_eq!(index.upsert(&entity(&id, 4, "red")).await.unwrap(), WriteOutcome::Stale);
        assert!(index.document(&id).is_none());
        assert_eq!(index.version_of(&id), Some(EntityVersion(5)));

        assert_eq!(index.upsert(&entity(&id, 6, "red")).await.unwrap(), WriteOutcome::Applied);
        assert!(index.document(&id).is_some());
    }

    #[tokio::test]
    async fn test_stale_delete_is_ignored() {
        let index = InMemoryIndex::new();
        let id = EntityId::new(Uuid::new_v4(), "widget");

        index.upsert(&entity(&id, 3, "red")).await.unwrap();

        assert_eq!(
            index.delete(&id, EntityVersion(2)).await.unwrap(),
            WriteOutcome::Stale
        );
        assert!(index.document(&id).is_some());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let index = InMemoryIndex::new();
        let id = EntityId::new(Uuid::new_v4(), "widget");
        index.fail_next_writes(1);

        let first = index.upsert(&entity(&id, 1, "red")).await;
        assert!(matches!(first, Err(IndexError::ConnectionError(_))));

        let second = index.upsert(&entity(&id, 1, "red")).await.unwrap();
        assert_eq!(second, WriteOutcome::Applied);
    }
}
