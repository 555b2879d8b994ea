//! # Entity Index Results
//!
//! Exposes an asynchronous stream of query result pages to callers that pull
//! results synchronously, one page at a time.
//!
//! [`LegacyResultBridge`] wraps the page stream. Every page comes out as a
//! [`Results`] holding [`LegacyEntity`] values and the page's cursor, and
//! carries a handle back to the bridge that produced it.

pub mod bridge;
pub mod entity;
pub mod errors;
pub mod results;

pub use bridge::{LegacyResultBridge, QueryExecutor};
pub use entity::LegacyEntity;
pub use errors::ResultsError;
pub use results::Results;
