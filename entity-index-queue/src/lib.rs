//! # Entity Index Queue
//!
//! This crate provides the durable side of queued index maintenance:
//! transports that carry index-update requests, and the consumer loop that
//! applies them to the search index.
//!
//! ## Architecture
//!
//! 1. **Transport**: Accepts, redelivers, and dead-letters messages (Kafka or in-memory)
//! 2. **Messages**: Encodes index-update requests for the wire
//! 3. **Consumer**: Receives messages, applies them, and acknowledges or releases them
//! 4. **Metrics**: Counts what flowed through the queue

pub mod consumer;
pub mod errors;
pub mod messages;
pub mod metrics;
pub mod transport;

pub use consumer::{ConsumerConfig, ConsumerReport, IndexConsumer};
pub use errors::QueueError;
pub use messages::{OutgoingMessage, QueuedMessage, Receipt, ReceivedMessage};
pub use metrics::{MetricsSnapshot, QueueMetrics};
pub use transport::{
    InMemoryQueue, InMemoryQueueConfig, InMemoryQueueFactory, KafkaQueue, KafkaQueueConfig,
    KafkaQueueFactory, QueueTransport, QueueTransportFactory,
};
