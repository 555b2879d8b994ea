//! Index error types.
//!
//! This module defines the errors that can occur while reading entities or
//! mutating the search index.

use thiserror::Error;

/// Errors that can occur during index maintenance.
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to write a document.
    #[error("Write error: {0}")]
    WriteError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create the search index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to read the entity from the primary store.
    #[error("Entity source error: {0}")]
    SourceError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The request or entity is malformed.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl IndexError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::WriteError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create an entity source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Whether the failure is likely transient (backend or store unavailable).
    ///
    /// Callers only use this for reporting; redelivery of queued updates is
    /// left to the queue transport regardless of the classification.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::SourceError(_) => true,
            Self::WriteError(msg) | Self::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("rate limit")
                    || msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("503")
                    || msg_lower.contains("429")
            }
            Self::IndexCreationError(_) | Self::ParseError(_) | Self::ValidationError(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(IndexError::connection("refused").is_retryable());
        assert!(IndexError::source("store unavailable").is_retryable());
        assert!(IndexError::write("status 503 Service Unavailable").is_retryable());
        assert!(IndexError::delete("request timeout").is_retryable());
        assert!(!IndexError::write("mapper_parsing_exception").is_retryable());
        assert!(!IndexError::validation("bad id").is_retryable());
    }
}
