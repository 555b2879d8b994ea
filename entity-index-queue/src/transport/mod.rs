//! Queue transport interfaces and implementations.
//!
//! A transport owns delivery guarantees: durability once `send` returns,
//! redelivery of released or abandoned messages, and the receive-count
//! boundary after which a message is dead-lettered. Consumers never retry on
//! their own.

mod kafka;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::QueueError;
use crate::messages::{OutgoingMessage, ReceivedMessage};

pub use kafka::{KafkaQueue, KafkaQueueConfig, KafkaQueueFactory};
pub use memory::{InMemoryQueue, InMemoryQueueConfig, InMemoryQueueFactory};

/// Abstract interface for a durable, at-least-once message queue.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; several consumers may share one
/// transport.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue a message.
    ///
    /// Returns once the transport has accepted the message durably.
    async fn send(&self, message: OutgoingMessage) -> Result<(), QueueError>;

    /// Receive up to `max` messages, waiting at most `wait` for the first one.
    ///
    /// An empty vector means nothing arrived within `wait`.
    async fn receive(&self, max: usize, wait: Duration)
        -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Acknowledge a processed message so it is never delivered again.
    async fn ack(&self, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Hand a message that failed processing back to the transport.
    ///
    /// The transport redelivers it later, or dead-letters it once its
    /// receive count reaches the configured maximum.
    async fn release(&self, message: ReceivedMessage) -> Result<(), QueueError>;
}

/// Creates transports by queue name.
pub trait QueueTransportFactory: Send + Sync {
    /// Get the transport for a named queue.
    fn transport(&self, queue_name: &str) -> Result<Arc<dyn QueueTransport>, QueueError>;
}
