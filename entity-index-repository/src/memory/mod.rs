//! In-memory implementations of the index writer and entity source.
//!
//! Used by local deployments and as test doubles throughout the workspace.

mod entity_store;
mod index;

pub use entity_store::InMemoryEntityStore;
pub use index::{InMemoryIndex, IndexedDocument};
