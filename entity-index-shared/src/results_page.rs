//! Result pages produced by the query pipeline.

use crate::entity::Entity;

/// One batch of matched entities plus an optional continuation cursor.
///
/// A present cursor means more results may exist. An absent cursor means the
/// producer believes the page sequence is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsPage {
    /// Matched entities, in result order.
    pub entities: Vec<Entity>,
    /// Opaque continuation token.
    pub cursor: Option<String>,
}

impl ResultsPage {
    /// Create a page with no cursor.
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            cursor: None,
        }
    }

    /// Attach a continuation cursor.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}
