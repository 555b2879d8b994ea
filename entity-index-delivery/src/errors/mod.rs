//! Error types for index-update delivery.

use entity_index_queue::QueueError;
use entity_index_repository::IndexError;
use thiserror::Error;

/// Errors that can occur while selecting a strategy or delivering an update.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The delivery configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The immediate index write failed.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    /// The update could not be enqueued.
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),
}

impl DeliveryError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }
}
