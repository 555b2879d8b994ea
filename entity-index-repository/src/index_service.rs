//! Index service implementation.
//!
//! The index service turns an [`IndexUpdateRequest`] into an index mutation:
//! it loads the entity at the requested version from the primary store and
//! hands it to the index writer. Both delivery strategies and the queue
//! consumer apply updates through this one path.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::IndexError;
use crate::interfaces::{EntitySource, IndexWriter};
use crate::types::WriteOutcome;
use entity_index_shared::{IndexOperation, IndexUpdateRequest};

/// Applies index-update requests against the search index.
#[derive(Clone)]
pub struct IndexService {
    source: Arc<dyn EntitySource>,
    writer: Arc<dyn IndexWriter>,
}

impl IndexService {
    /// Create a new index service over an entity source and an index writer.
    pub fn new(source: Arc<dyn EntitySource>, writer: Arc<dyn IndexWriter>) -> Self {
        Self { source, writer }
    }

    /// The underlying index writer.
    pub fn writer(&self) -> &Arc<dyn IndexWriter> {
        &self.writer
    }

    /// Apply one index-update request.
    ///
    /// Safe to call more than once for the same request: the writer resolves
    /// duplicates and out-of-order versions by keeping the highest version.
    #[instrument(
        skip(self, request),
        fields(entity_id = %request.entity_id, version = %request.version, operation = ?request.operation)
    )]
    pub async fn apply(&self, request: &IndexUpdateRequest) -> Result<WriteOutcome, IndexError> {
        let outcome = match request.operation {
            IndexOperation::Upsert => {
                match self.source.load(&request.entity_id, request.version).await? {
                    Some(entity) => {
                        if entity.id != request.entity_id {
                            return Err(IndexError::validation(format!(
                                "entity source returned {} for request {}",
                                entity.id, request.entity_id
                            )));
                        }
                        self.writer.upsert(&entity).await?
                    }
                    None => {
                        debug!("Entity not found at version, nothing to index");
                        WriteOutcome::Skipped
                    }
                }
            }
            IndexOperation::Delete => {
                self.writer
                    .delete(&request.entity_id, request.version)
                    .await?
            }
        };

        debug!(outcome = ?outcome, "Applied index update");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryEntityStore, InMemoryIndex};
    use async_trait::async_trait;
    use entity_index_shared::{Entity, EntityId, EntityVersion};
    use uuid::Uuid;

    /// Entity source that always fails, for error propagation tests.
    struct FailingSource;

    #[async_trait]
    impl EntitySource for FailingSource {
        async fn load(
            &self,
            _entity_id: &EntityId,
            _version: EntityVersion,
        ) -> Result<Option<Entity>, IndexError> {
            Err(IndexError::source("store unavailable"))
        }
    }

    fn widget() -> EntityId {
        EntityId::new(Uuid::new_v4(), "widget")
    }

    #[tokio::test]
    async fn test_apply_upsert_indexes_entity() {
        let store = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let service = IndexService::new(store.clone(), index.clone());

        let id = widget();
        store.put(Entity::new(id.clone(), EntityVersion(1)).with_field("color", "red"));

        let outcome = service
            .apply(&IndexUpdateRequest::upsert(id.clone(), EntityVersion(1)))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Applied);
        let doc = index.document(&id).unwrap();
        assert_eq!(doc.version, EntityVersion(1));
        assert_eq!(doc.fields["color"], "red");
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let store = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let service = IndexService::new(store.clone(), index.clone());

        let id = widget();
        store.put(Entity::new(id.clone(), EntityVersion(3)).with_field("color", "blue"));
        let request = IndexUpdateRequest::upsert(id.clone(), EntityVersion(3));

        let first = service.apply(&request).await.unwrap();
        let after_first = index.document(&id);
        let second = service.apply(&request).await.unwrap();

        assert_eq!(first, WriteOutcome::Applied);
        assert_eq!(second, WriteOutcome::Stale);
        assert_eq!(index.document(&id), after_first);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_missing_entity_is_skipped() {
        let store = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let service = IndexService::new(store, index.clone());

        let outcome = service
            .apply(&IndexUpdateRequest::upsert(widget(), EntityVersion(1)))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Skipped);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_apply_delete() {
        let store = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let service = IndexService::new(store.clone(), index.clone());

        let id = widget();
        store.put(Entity::new(id.clone(), EntityVersion(1)));
        service
            .apply(&IndexUpdateRequest::upsert(id.clone(), EntityVersion(1)))
            .await
            .unwrap();

        let outcome = service
            .apply(&IndexUpdateRequest::delete(id.clone(), EntityVersion(2)))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Applied);
        assert!(index.document(&id).is_none());
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let index = Arc::new(InMemoryIndex::new());
        let service = IndexService::new(Arc::new(FailingSource), index.clone());

        let result = service
            .apply(&IndexUpdateRequest::upsert(widget(), EntityVersion(1)))
            .await;

        assert!(matches!(result, Err(IndexError::SourceError(_))));
        assert!(index.is_empty());
    }
}
