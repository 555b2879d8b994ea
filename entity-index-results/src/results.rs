//! One page of results in legacy shape.

use crate::bridge::LegacyResultBridge;
use crate::entity::LegacyEntity;
use entity_index_shared::ResultsPage;

/// Translated entities of one result page, plus its cursor.
#[derive(Debug, Clone, Default)]
pub struct Results {
    entities: Vec<LegacyEntity>,
    cursor: Option<String>,
    query_executor: Option<LegacyResultBridge>,
}

impl Results {
    /// A page with no entities and no cursor.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: Vec<LegacyEntity>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    /// Translate a result page. The cursor is copied through unchanged.
    pub fn from_page(page: ResultsPage) -> Self {
        let mut results = Self::from_entities(page.entities.iter().map(LegacyEntity::from).collect());
        results.set_cursor(page.cursor);
        results
    }

    pub fn entities(&self) -> &[LegacyEntity] {
        &self.entities
    }

    /// The first entity, if any.
    pub fn entity(&self) -> Option<&LegacyEntity> {
        self.entities.first()
    }

    pub fn size(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Continuation token for fetching the following pages.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn set_cursor(&mut self, cursor: Option<String>) {
        self.cursor = cursor;
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// The bridge this page was pulled from.
    pub fn query_executor(&self) -> Option<&LegacyResultBridge> {
        self.query_executor.as_ref()
    }

    pub(crate) fn set_query_executor(&mut self, bridge: LegacyResultBridge) {
        self.query_executor = Some(bridge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_index_shared::{Entity, EntityId, EntityVersion};
    use uuid::Uuid;

    #[test]
    fn test_from_page_keeps_order_and_cursor() {
        let first = Entity::new(EntityId::new(Uuid::from_u128(1), "widget"), EntityVersion(1));
        let second = Entity::new(EntityId::new(Uuid::from_u128(2), "widget"), EntityVersion(1));
        let page = ResultsPage::new(vec![first, second]).with_cursor("next");

        let results = Results::from_page(page);

        assert_eq!(results.size(), 2);
        assert_eq!(results.entity().unwrap().uuid(), Uuid::from_u128(1));
        assert_eq!(results.entities()[1].uuid(), Uuid::from_u128(2));
        assert_eq!(results.cursor(), Some("next"));
        assert!(results.query_executor().is_none());
    }

    #[test]
    fn test_empty_has_no_cursor() {
        let results = Results::empty();

        assert!(results.is_empty());
        assert!(!results.has_cursor());
    }
}
