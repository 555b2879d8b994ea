//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexWriter` using
//! the OpenSearch Rust client.

use async_trait::async_trait;
use chrono::Utc;
use opensearch::{
    cluster::ClusterHealthParts,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::VersionType,
    DeleteParts, IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::IndexError;
use crate::interfaces::IndexWriter;
use crate::opensearch::index_config::IndexConfig;
use crate::types::WriteOutcome;
use entity_index_shared::{Entity, EntityId, EntityVersion};

/// HTTP status OpenSearch returns when an external version is not newer.
const VERSION_CONFLICT: u16 = 409;

/// HTTP status for a missing document.
const NOT_FOUND: u16 = 404;

/// OpenSearch index writer.
///
/// Every write carries the entity version with `version_type=external_gte`,
/// so OpenSearch rejects anything older than what is already indexed and
/// accepts an exact replay of the current version unchanged.
///
/// # Example
///
/// ```ignore
/// let writer = OpenSearchIndexWriter::new("http://localhost:9200", IndexConfig::default()).await?;
/// writer.ensure_index_exists().await?;
/// writer.upsert(&entity).await?;
/// ```
pub struct OpenSearchIndexWriter {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchIndexWriter {
    /// Create a new OpenSearch index writer connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index name and shard layout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchIndexWriter)` - A new writer instance
    /// * `Err(IndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, IndexError> {
        let parsed_url = Url::parse(url).map_err(|e| IndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, index = %index_config.name, "Created OpenSearch index writer");

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Generate a document ID from an entity identity.
    ///
    /// Uses format: `{entity_type}_{uuid}` to ensure uniqueness across types.
    fn document_id(entity_id: &EntityId) -> String {
        format!("{}_{}", entity_id.entity_type, entity_id.uuid)
    }

    /// Build the document body for an entity.
    fn document_body(entity: &Entity) -> Value {
        json!({
            "entity_id": entity.id.uuid.to_string(),
            "entity_type": entity.id.entity_type,
            "version": entity.version.get(),
            "fields": entity.fields,
            "indexed_at": Utc::now().to_rfc3339(),
        })
    }

    /// OpenSearch external versions are signed 64-bit integers.
    fn external_version(version: EntityVersion) -> Result<i64, IndexError> {
        i64::try_from(version.get()).map_err(|_| {
            IndexError::validation(format!("version {} exceeds the external version range", version))
        })
    }
}

#[async_trait]
impl IndexWriter for OpenSearchIndexWriter {
    #[instrument(skip(self, entity), fields(entity_id = %entity.id, version = %entity.version))]
    async fn upsert(&self, entity: &Entity) -> Result<WriteOutcome, IndexError> {
        let doc_id = Self::document_id(&entity.id);
        let version = Self::external_version(entity.version)?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.name, &doc_id))
            .version(version)
            .version_type(VersionType::ExternalGte)
            .body(Self::document_body(entity))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == VERSION_CONFLICT {
            debug!(doc_id = %doc_id, "Newer version already indexed");
            return Ok(WriteOutcome::Stale);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index request failed");
            return Err(IndexError::write(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %doc_id, "Document indexed");
        Ok(WriteOutcome::Applied)
    }

    #[instrument(skip(self), fields(entity_id = %entity_id, version = %version))]
    async fn delete(
        &self,
        entity_id: &EntityId,
        version: EntityVersion,
    ) -> Result<WriteOutcome, IndexError> {
        let doc_id = Self::document_id(entity_id);
        let external = Self::external_version(version)?;

        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.index_config.name, &doc_id))
            .version(external)
            .version_type(VersionType::ExternalGte)
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let status = response.status_code();
        match status.as_u16() {
            VERSION_CONFLICT => {
                debug!(doc_id = %doc_id, "Newer version already indexed, delete ignored");
                Ok(WriteOutcome::Stale)
            }
            // 404 is acceptable - document may never have been indexed
            NOT_FOUND => Ok(WriteOutcome::Skipped),
            _ if status.is_success() => {
                debug!(doc_id = %doc_id, "Document deleted");
                Ok(WriteOutcome::Applied)
            }
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                error!(status = %status, body = %error_body, "Delete request failed");
                Err(IndexError::delete(format!(
                    "Delete failed with status {}: {}",
                    status, error_body
                )))
            }
        }
    }

    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        let name = self.index_config.name.as_str();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %name, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(self.index_config.settings())
            .send()
            .await
            .map_err(|e| IndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another process may have created it between the check and the create
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IndexError::index_creation(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %name, "Created search index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| IndexError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| IndexError::parse(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}
