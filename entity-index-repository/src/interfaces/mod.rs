//! Interface definitions for the index writer and the entity source.
//!
//! These traits allow for dependency injection and swappable backends
//! (OpenSearch, in-memory, mocks in tests).

mod entity_source;
mod index_writer;

pub use entity_source::EntitySource;
pub use index_writer::IndexWriter;
