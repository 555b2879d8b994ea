//! Index-update requests produced by the write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityVersion};

/// The kind of index mutation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOperation {
    /// Entity was created or updated.
    Upsert,
    /// Entity was deleted.
    Delete,
}

/// One index-update request, produced once per entity mutation.
///
/// A request may be delivered to the index writer more than once, so
/// applying it must be idempotent per `(entity_id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexUpdateRequest {
    /// The mutated entity.
    pub entity_id: EntityId,
    /// The version produced by the mutation.
    pub version: EntityVersion,
    /// Upsert or delete.
    pub operation: IndexOperation,
    /// When the write path emitted the request.
    pub requested_at: DateTime<Utc>,
}

impl IndexUpdateRequest {
    /// Create an upsert request.
    pub fn upsert(entity_id: EntityId, version: EntityVersion) -> Self {
        Self::new(entity_id, version, IndexOperation::Upsert)
    }

    /// Create a delete request.
    pub fn delete(entity_id: EntityId, version: EntityVersion) -> Self {
        Self::new(entity_id, version, IndexOperation::Delete)
    }

    fn new(entity_id: EntityId, version: EntityVersion, operation: IndexOperation) -> Self {
        Self {
            entity_id,
            version,
            operation,
            requested_at: Utc::now(),
        }
    }
}
