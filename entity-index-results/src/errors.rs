//! Error types for result iteration.

use thiserror::Error;

/// Errors returned while pulling results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultsError {
    /// `take_next` was called after the last page was handed out.
    #[error("No more results present")]
    Exhausted,

    /// The page producer failed.
    #[error("Result pipeline error: {0}")]
    PipelineError(String),
}

impl ResultsError {
    /// Create a pipeline error.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::PipelineError(msg.into())
    }
}
