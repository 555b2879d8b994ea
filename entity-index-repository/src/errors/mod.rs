//! Error types for the entity index repository.

mod index_error;

pub use index_error::IndexError;
