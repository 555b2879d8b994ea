//! # Entity Index Shared
//!
//! Shared types for the entity index system: entity identities and versions,
//! index-update requests flowing down the write path, and result pages
//! flowing back up the read path.

mod entity;
mod request;
mod results_page;

pub use entity::{Entity, EntityId, EntityVersion};
pub use request::{IndexOperation, IndexUpdateRequest};
pub use results_page::ResultsPage;
