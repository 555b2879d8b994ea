//! Error types for the entity index queue.

use entity_index_repository::IndexError;
use thiserror::Error;

/// Errors that can occur while queuing or consuming index updates.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The transport rejected or failed an operation.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Error encoding or decoding a queued message.
    #[error("Codec error: {0}")]
    CodecError(String),

    /// A receipt from a different transport was handed back.
    #[error("Invalid receipt: {0}")]
    InvalidReceipt(String),

    /// Error from the search index.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),
}

impl QueueError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a codec error.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::CodecError(msg.into())
    }

    /// Create an invalid receipt error.
    pub fn invalid_receipt(msg: impl Into<String>) -> Self {
        Self::InvalidReceipt(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for QueueError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}
