//! Configuration and dependency wiring.

mod dependencies;
mod settings;

pub use dependencies::{Dependencies, WorkerHandle};
pub use settings::{IndexerConfig, LogFormat};
