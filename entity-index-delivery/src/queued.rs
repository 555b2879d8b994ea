//! Delivery through a durable queue.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::errors::DeliveryError;
use entity_index_queue::{OutgoingMessage, QueueMetrics, QueueTransport};
use entity_index_shared::IndexUpdateRequest;

/// Enqueues each update and returns once the transport has accepted it.
///
/// The index write happens later, in an [`IndexConsumer`] reading the same
/// queue. Index failures are never reported to the caller.
///
/// [`IndexConsumer`]: entity_index_queue::IndexConsumer
#[derive(Clone)]
pub struct QueuedDelivery {
    transport: Arc<dyn QueueTransport>,
    metrics: Arc<QueueMetrics>,
    queue_name: String,
}

impl QueuedDelivery {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        metrics: Arc<QueueMetrics>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            metrics,
            queue_name: queue_name.into(),
        }
    }

    /// The queue updates are sent to.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    #[instrument(
        skip(self, request),
        fields(queue = %self.queue_name, entity_id = %request.entity_id, version = %request.version)
    )]
    pub async fn deliver(&self, request: &IndexUpdateRequest) -> Result<(), DeliveryError> {
        let message = OutgoingMessage::from_request(request)?;

        if let Err(e) = self.transport.send(message).await {
            error!(error = %e, "Failed to enqueue index update");
            self.metrics.record_enqueue_failure();
            return Err(e.into());
        }

        self.metrics.record_enqueued();
        debug!("Enqueued index update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_index_queue::{InMemoryQueue, InMemoryQueueConfig, QueueError, ReceivedMessage};
    use entity_index_shared::{EntityId, EntityVersion};
    use std::time::Duration;
    use uuid::Uuid;

    struct UnavailableTransport;

    #[async_trait::async_trait]
    impl QueueTransport for UnavailableTransport {
        async fn send(&self, _message: OutgoingMessage) -> Result<(), QueueError> {
            Err(QueueError::transport("queue unavailable"))
        }

        async fn receive(
            &self,
            _max: usize,
            _wait: Duration,
        ) -> Result<Vec<ReceivedMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn ack(&self, _message: &ReceivedMessage) -> Result<(), QueueError> {
            Ok(())
        }

        async fn release(&self, _message: ReceivedMessage) -> Result<(), QueueError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deliver_enqueues_without_applying() {
        let queue = Arc::new(InMemoryQueue::new("updates", InMemoryQueueConfig::default()));
        let metrics = Arc::new(QueueMetrics::new());
        let delivery = QueuedDelivery::new(queue.clone(), metrics.clone(), "updates");
        let request = IndexUpdateRequest::upsert(EntityId::new(Uuid::new_v4(), "widget"), EntityVersion(1));

        delivery.deliver(&request).await.unwrap();

        assert_eq!(queue.pending(), 1);
        assert_eq!(metrics.snapshot().enqueued, 1);

        let received = queue.receive(1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received[0].decode_request().unwrap(), request);
        assert_eq!(received[0].key.as_deref(), Some(request.entity_id.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_enqueue_failure_reaches_caller() {
        let metrics = Arc::new(QueueMetrics::new());
        let delivery = QueuedDelivery::new(Arc::new(UnavailableTransport), metrics.clone(), "updates");
        let request = IndexUpdateRequest::upsert(EntityId::new(Uuid::new_v4(), "widget"), EntityVersion(1));

        let result = delivery.deliver(&request).await;

        assert!(matches!(
            result,
            Err(DeliveryError::QueueError(QueueError::TransportError(_)))
        ));
        assert_eq!(metrics.snapshot().enqueue_failures, 1);
        assert_eq!(metrics.snapshot().enqueued, 0);
    }
}
