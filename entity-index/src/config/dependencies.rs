//! Dependency initialization and wiring for the entity indexer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::IndexerConfig;
use crate::IndexingError;
use entity_index_delivery::{DeliveryStrategy, DeliveryStrategyProvider, QueueImplementation};
use entity_index_queue::{
    ConsumerConfig, IndexConsumer, KafkaQueueFactory, QueueError, QueueMetrics,
    QueueTransportFactory,
};
use entity_index_repository::{
    opensearch::IndexConfig, EntitySource, IndexService, IndexWriter, OpenSearchIndexWriter,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    config: IndexerConfig,
    index_service: IndexService,
    queue_factory: Arc<dyn QueueTransportFactory>,
    metrics: Arc<QueueMetrics>,
    delivery: Arc<DeliveryStrategyProvider>,
    consumer_config: ConsumerConfig,
}

impl Dependencies {
    /// Initialize OpenSearch and Kafka from configuration.
    ///
    /// The entity source is the primary store and is supplied by the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If OpenSearch is unreachable or unhealthy
    pub async fn new(
        config: IndexerConfig,
        source: Arc<dyn EntitySource>,
    ) -> Result<Self, IndexingError> {
        info!(
            queue_implementation = %config.queue_implementation,
            queue_name = %config.queue_name,
            opensearch_url = %config.opensearch_url,
            kafka_broker = %config.kafka_broker,
            kafka_group_id = %config.kafka_group_id,
            "Initializing dependencies"
        );

        let writer = OpenSearchIndexWriter::new(
            &config.opensearch_url,
            IndexConfig::new(&config.opensearch_index),
        )
        .await
        .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        // Verify OpenSearch is reachable
        let healthy = writer
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        writer.ensure_index_exists().await?;
        info!("OpenSearch connection verified");

        let queue_factory = KafkaQueueFactory::new(&config.kafka_broker, &config.kafka_group_id)
            .with_max_receive_count(config.max_receive_count)
            .with_dead_letter_topic(&config.dead_letter_queue);

        Ok(Self::with_components(
            config,
            source,
            Arc::new(writer),
            Arc::new(queue_factory),
        ))
    }

    /// Wire dependencies from already-built components.
    pub fn with_components(
        config: IndexerConfig,
        source: Arc<dyn EntitySource>,
        writer: Arc<dyn IndexWriter>,
        queue_factory: Arc<dyn QueueTransportFactory>,
    ) -> Self {
        let index_service = IndexService::new(source, writer);
        let metrics = Arc::new(QueueMetrics::new());
        let delivery = Arc::new(DeliveryStrategyProvider::new(
            config.delivery_config(),
            index_service.clone(),
            queue_factory.clone(),
            metrics.clone(),
        ));

        Self {
            config,
            index_service,
            queue_factory,
            metrics,
            delivery,
            consumer_config: ConsumerConfig::default(),
        }
    }

    /// Override how consumer workers poll.
    pub fn with_consumer_config(mut self, consumer_config: ConsumerConfig) -> Self {
        self.consumer_config = consumer_config;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.metrics
    }

    /// The process-wide strategy selector.
    pub fn delivery(&self) -> &Arc<DeliveryStrategyProvider> {
        &self.delivery
    }

    /// Resolve the configured delivery strategy.
    pub async fn delivery_strategy(&self) -> Result<Arc<DeliveryStrategy>, IndexingError> {
        Ok(self.delivery.get().await?)
    }

    /// Start the configured number of consumer workers.
    ///
    /// Workers only run in queued mode; in local mode no worker is started.
    #[instrument(skip(self), fields(queue_implementation = %self.config.queue_implementation))]
    pub fn start_consumers(&self) -> Result<WorkerHandle, IndexingError> {
        let implementation: QueueImplementation = self.config.queue_implementation.parse()?;
        let (shutdown, _) = broadcast::channel(1);

        if implementation != QueueImplementation::Queued {
            info!(implementation = %implementation, "No consumer workers needed");
            return Ok(WorkerHandle {
                shutdown,
                workers: Vec::new(),
            });
        }

        let transport = self.queue_factory.transport(&self.config.queue_name)?;
        let workers = (0..self.config.consumer_workers)
            .map(|worker| {
                let consumer = IndexConsumer::with_config(
                    transport.clone(),
                    self.index_service.clone(),
                    self.metrics.clone(),
                    self.consumer_config.clone(),
                );
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    info!(worker, "Consumer worker started");
                    consumer.run(shutdown_rx).await
                })
            })
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            queue = %self.config.queue_name,
            "Started consumer workers"
        );
        Ok(WorkerHandle { shutdown, workers })
    }
}

/// Running consumer workers.
pub struct WorkerHandle {
    shutdown: broadcast::Sender<()>,
    workers: Vec<JoinHandle<Result<(), QueueError>>>,
}

impl WorkerHandle {
    /// Number of running workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signal every worker to stop and wait up to `grace` for each.
    pub async fn shutdown(self, grace: Duration) -> Result<(), IndexingError> {
        if !self.workers.is_empty() {
            info!(workers = self.workers.len(), "Stopping consumer workers");
            // Errors only when no worker is subscribed any more.
            let _ = self.shutdown.send(());
        }

        let mut failure = None;
        for worker in self.workers {
            match tokio::time::timeout(grace, worker).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => {
                    error!(error = %e, "Consumer worker failed");
                    failure.get_or_insert(IndexingError::from(e));
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Consumer worker panicked");
                    failure.get_or_insert(IndexingError::worker(e.to_string()));
                }
                Err(_) => {
                    warn!("Consumer worker did not stop within grace period");
                    failure.get_or_insert(IndexingError::worker("shutdown timed out"));
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
