//! # Entity Index Repository
//!
//! This crate provides the traits at the edge of the index-maintenance core:
//! the [`IndexWriter`] that mutates the search index and the [`EntitySource`]
//! that reads versioned entities from the primary store. [`IndexService`]
//! combines the two into the single "apply this update" operation used by
//! every delivery strategy.
//!
//! Implementations are provided for OpenSearch and for an in-memory index
//! suitable for local deployments and tests.

pub mod errors;
pub mod index_service;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use errors::IndexError;
pub use index_service::IndexService;
pub use interfaces::{EntitySource, IndexWriter};
pub use memory::{InMemoryEntityStore, InMemoryIndex};
pub use opensearch::OpenSearchIndexWriter;
pub use types::WriteOutcome;
