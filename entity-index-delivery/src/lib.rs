//! # Entity Index Delivery
//!
//! This crate gets index-update requests from the write path to the search
//! index.
//!
//! ## Strategies
//!
//! 1. **Immediate**: Applies the update on the caller's task before returning
//! 2. **Queued**: Enqueues the update on a durable queue for an [`IndexConsumer`]
//!    to apply later
//!
//! [`DeliveryStrategyProvider`] picks one from configuration and hands out the
//! same instance for the life of the process.
//!
//! [`IndexConsumer`]: entity_index_queue::IndexConsumer

pub mod config;
pub mod errors;
pub mod immediate;
pub mod provider;
pub mod queued;
pub mod strategy;

pub use config::{DeliveryConfig, QueueImplementation};
pub use errors::DeliveryError;
pub use immediate::ImmediateDelivery;
pub use provider::DeliveryStrategyProvider;
pub use queued::QueuedDelivery;
pub use strategy::{DeliveryReceipt, DeliveryStrategy};
