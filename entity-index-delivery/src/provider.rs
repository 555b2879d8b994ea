//! Process-wide delivery strategy selection.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

use crate::config::{DeliveryConfig, QueueImplementation};
use crate::errors::DeliveryError;
use crate::immediate::ImmediateDelivery;
use crate::queued::QueuedDelivery;
use crate::strategy::DeliveryStrategy;
use entity_index_queue::{QueueMetrics, QueueTransportFactory};
use entity_index_repository::IndexService;

/// Resolves the configured delivery strategy once and hands out that same
/// instance on every later call.
///
/// `get` may be called concurrently from any number of tasks. Exactly one
/// of them constructs the strategy; the others wait for it. A failed
/// construction is not remembered, so a later call tries again.
pub struct DeliveryStrategyProvider {
    config: DeliveryConfig,
    index_service: IndexService,
    queue_factory: Arc<dyn QueueTransportFactory>,
    metrics: Arc<QueueMetrics>,
    strategy: OnceCell<Arc<DeliveryStrategy>>,
}

impl DeliveryStrategyProvider {
    pub fn new(
        config: DeliveryConfig,
        index_service: IndexService,
        queue_factory: Arc<dyn QueueTransportFactory>,
        metrics: Arc<QueueMetrics>,
    ) -> Self {
        Self {
            config,
            index_service,
            queue_factory,
            metrics,
            strategy: OnceCell::new(),
        }
    }

    /// Get the process-wide delivery strategy, building it on first use.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<DeliveryStrategy>)` - The memoized strategy
    /// * `Err(DeliveryError)` - If the configured implementation is not
    ///   recognized, or its queue transport cannot be created
    pub async fn get(&self) -> Result<Arc<DeliveryStrategy>, DeliveryError> {
        let strategy = self
            .strategy
            .get_or_try_init(|| async { self.build().map(Arc::new) })
            .await?;
        Ok(strategy.clone())
    }

    /// Whether the strategy has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.strategy.initialized()
    }

    #[instrument(skip(self), fields(queue_implementation = %self.config.queue_implementation))]
    fn build(&self) -> Result<DeliveryStrategy, DeliveryError> {
        let implementation: QueueImplementation =
            self.config.queue_implementation.parse().inspect_err(|e| {
                error!(
                    configured = %self.config.queue_implementation,
                    error = %e,
                    "Cannot resolve index delivery strategy"
                );
            })?;

        let strategy = match implementation {
            QueueImplementation::Local => {
                DeliveryStrategy::Immediate(ImmediateDelivery::new(self.index_service.clone()))
            }
            QueueImplementation::Queued => {
                let transport = self.queue_factory.transport(&self.config.queue_name)?;
                DeliveryStrategy::Queued(QueuedDelivery::new(
                    transport,
                    self.metrics.clone(),
                    self.config.queue_name.clone(),
                ))
            }
        };

        info!(
            implementation = %implementation,
            queue = %self.config.queue_name,
            "Initialized index delivery strategy"
        );
        Ok(strategy)
    }
}
