//! OpenSearch implementation of the index writer.
//!
//! Versions are enforced by OpenSearch itself through external versioning,
//! so concurrent consumers can write the same identity safely.

mod client;
mod index_config;

pub use client::OpenSearchIndexWriter;
pub use index_config::IndexConfig;
