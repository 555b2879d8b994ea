//! Consumer loop for queued index updates.
//!
//! Receives index-update messages from a transport, applies them through the
//! index service, and acknowledges or releases each one. Several consumers
//! may run against the same transport; duplicate or out-of-order delivery is
//! absorbed by the index writer's version rule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::QueueError;
use crate::messages::ReceivedMessage;
use crate::metrics::QueueMetrics;
use crate::transport::QueueTransport;
use entity_index_repository::{IndexService, WriteOutcome};

/// Configuration for a consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum messages taken from the transport per poll.
    pub batch_size: usize,
    /// How long a poll waits for the first message.
    pub receive_wait: Duration,
    /// Pause after a failed poll before trying again.
    pub error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            receive_wait: Duration::from_secs(1),
            error_backoff: Duration::from_millis(500),
        }
    }
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub received: usize,
    pub applied: usize,
    pub stale: usize,
    pub skipped: usize,
    pub released: usize,
}

/// Consumer that applies queued index updates.
pub struct IndexConsumer {
    transport: Arc<dyn QueueTransport>,
    index_service: IndexService,
    config: ConsumerConfig,
    metrics: Arc<QueueMetrics>,
}

impl IndexConsumer {
    /// Create a new consumer with default configuration.
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        index_service: IndexService,
        metrics: Arc<QueueMetrics>,
    ) -> Self {
        Self::with_config(transport, index_service, metrics, ConsumerConfig::default())
    }

    /// Create a new consumer with custom configuration.
    pub fn with_config(
        transport: Arc<dyn QueueTransport>,
        index_service: IndexService,
        metrics: Arc<QueueMetrics>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            transport,
            index_service,
            config,
            metrics,
        }
    }

    /// Receive one batch and process every message in it.
    ///
    /// Per-message failures are released back to the transport and counted.
    /// Transport failures on `receive` are returned, and so is a failed
    /// `release`. That ends the batch: later messages are left unacked for
    /// the transport to redeliver, so no ack can move past the message the
    /// transport failed to take back.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Result<ConsumerReport, QueueError> {
        let messages = self
            .transport
            .receive(self.config.batch_size, self.config.receive_wait)
            .await?;

        let mut report = ConsumerReport {
            received: messages.len(),
            ..ConsumerReport::default()
        };
        if messages.is_empty() {
            return Ok(report);
        }
        self.metrics.record_received(messages.len());

        for message in messages {
            match self.process_message(&message).await {
                Ok(outcome) => {
                    match outcome {
                        WriteOutcome::Applied => {
                            report.applied += 1;
                            self.metrics.record_applied();
                        }
                        WriteOutcome::Stale => {
                            report.stale += 1;
                            self.metrics.record_stale();
                        }
                        WriteOutcome::Skipped => {
                            report.skipped += 1;
                            self.metrics.record_skipped();
                        }
                    }
                    if let Err(e) = self.transport.ack(&message).await {
                        // The message will be redelivered and re-applied idempotently
                        error!(error = %e, "Failed to acknowledge message");
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        receive_count = message.receive_count,
                        "Failed to apply queued index update, releasing for redelivery"
                    );
                    report.released += 1;
                    self.metrics.record_released();
                    self.transport.release(message).await.inspect_err(|e| {
                        error!(error = %e, "Failed to release message, abandoning batch");
                    })?;
                }
            }
        }

        debug!(?report, "Processed batch");
        Ok(report)
    }

    async fn process_message(&self, message: &ReceivedMessage) -> Result<WriteOutcome, QueueError> {
        let request = message.decode_request().inspect_err(|_| {
            self.metrics.record_decode_failure();
        })?;

        let outcome = self.index_service.apply(&request).await.inspect_err(|e| {
            debug!(
                entity_id = %request.entity_id,
                version = %request.version,
                retryable = e.is_retryable(),
                "Index service rejected update"
            );
        })?;

        Ok(outcome)
    }

    /// Run the consumer until a shutdown signal is received.
    ///
    /// Poll failures are logged and retried after a short backoff; they never
    /// end the loop.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), QueueError> {
        info!("Starting index consumer");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    break;
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "Failed to poll queue");
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                }
            }
        }

        info!("Index consumer stopped");
        Ok(())
    }
}
