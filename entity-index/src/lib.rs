//! # Entity Index
//!
//! Keeps a search index eventually consistent with the primary entity store.
//!
//! This crate loads configuration, initializes logging, and wires the
//! delivery strategy, the queue consumers, and the index writer together.
//! The building blocks live in the `entity-index-*` crates and are
//! re-exported here.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, IndexerConfig, LogFormat, WorkerHandle};
pub use entity_index_delivery::{
    DeliveryReceipt, DeliveryStrategy, DeliveryStrategyProvider, QueueImplementation,
};
pub use entity_index_results::{LegacyEntity, LegacyResultBridge, QueryExecutor, Results};
pub use entity_index_shared::{
    Entity, EntityId, EntityVersion, IndexOperation, IndexUpdateRequest, ResultsPage,
};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Delivery error.
    #[error("Delivery error: {0}")]
    DeliveryError(#[from] entity_index_delivery::DeliveryError),

    /// Queue error.
    #[error("Queue error: {0}")]
    QueueError(#[from] entity_index_queue::QueueError),

    /// Index error.
    #[error("Index error: {0}")]
    IndexError(#[from] entity_index_repository::IndexError),

    /// A consumer worker panicked or was cancelled.
    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::WorkerError(msg.into())
    }
}
