//! The delivery strategy variants.

use crate::config::QueueImplementation;
use crate::errors::DeliveryError;
use crate::immediate::ImmediateDelivery;
use crate::queued::QueuedDelivery;
use entity_index_repository::WriteOutcome;
use entity_index_shared::IndexUpdateRequest;

/// What happened to a delivered update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReceipt {
    /// The update was applied to the index before `deliver` returned.
    Applied(WriteOutcome),
    /// The update was accepted by the queue and will be applied later.
    Enqueued,
}

/// One way of getting index updates to the index writer.
#[derive(Clone)]
pub enum DeliveryStrategy {
    Immediate(ImmediateDelivery),
    Queued(QueuedDelivery),
}

impl DeliveryStrategy {
    /// Deliver one index-update request.
    pub async fn deliver(&self, request: &IndexUpdateRequest) -> Result<DeliveryReceipt, DeliveryError> {
        match self {
            DeliveryStrategy::Immediate(delivery) => {
                delivery.deliver(request).await.map(DeliveryReceipt::Applied)
            }
            DeliveryStrategy::Queued(delivery) => {
                delivery.deliver(request).await?;
                Ok(DeliveryReceipt::Enqueued)
            }
        }
    }

    /// The configured implementation this strategy was built for.
    pub fn kind(&self) -> QueueImplementation {
        match self {
            DeliveryStrategy::Immediate(_) => QueueImplementation::Local,
            DeliveryStrategy::Queued(_) => QueueImplementation::Queued,
        }
    }
}

impl std::fmt::Debug for DeliveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStrategy::Immediate(_) => f.write_str("DeliveryStrategy::Immediate"),
            DeliveryStrategy::Queued(delivery) => f
                .debug_tuple("DeliveryStrategy::Queued")
                .field(&delivery.queue_name())
                .finish(),
        }
    }
}
