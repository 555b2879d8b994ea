//! Write path to index, through the queued strategy.

use std::sync::Arc;
use std::time::Duration;

use entity_index::{
    Dependencies, DeliveryReceipt, Entity, EntityId, EntityVersion, IndexUpdateRequest,
    IndexerConfig, QueueImplementation,
};
use entity_index_queue::{
    ConsumerConfig, InMemoryQueueConfig, InMemoryQueueFactory, OutgoingMessage, QueueTransport,
};
use entity_index_repository::{InMemoryEntityStore, InMemoryIndex};
use uuid::Uuid;

struct Harness {
    store: Arc<InMemoryEntityStore>,
    index: Arc<InMemoryIndex>,
    queues: Arc<InMemoryQueueFactory>,
    deps: Dependencies,
}

fn harness(implementation: &str, workers: usize) -> Harness {
    let config = IndexerConfig::from_lookup(|key| match key {
        "INDEX_QUEUE_IMPLEMENTATION" => Some(implementation.to_string()),
        "INDEX_QUEUE_NAME" => Some("updates".to_string()),
        "INDEX_CONSUMER_WORKERS" => Some(workers.to_string()),
        "INDEX_MAX_RECEIVE_COUNT" => Some("3".to_string()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(InMemoryEntityStore::new());
    let index = Arc::new(InMemoryIndex::new());
    let queues = Arc::new(InMemoryQueueFactory::new(InMemoryQueueConfig {
        visibility_timeout: Duration::from_millis(200),
        max_receive_count: config.max_receive_count,
    }));

    let deps = Dependencies::with_components(config, store.clone(), index.clone(), queues.clone())
        .with_consumer_config(ConsumerConfig {
            batch_size: 4,
            receive_wait: Duration::from_millis(20),
            error_backoff: Duration::from_millis(10),
        });

    Harness {
        store,
        index,
        queues,
        deps,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_update_reaches_the_index_once_despite_redelivery() {
    let h = harness("queued", 2);
    let id = EntityId::new(Uuid::new_v4(), "widget");
    h.store
        .put(Entity::new(id.clone(), EntityVersion(1)).with_field("color", "red"));

    let strategy = h.deps.delivery_strategy().await.unwrap();
    assert_eq!(strategy.kind(), QueueImplementation::Queued);

    // The first index write fails; the message must come back.
    h.index.fail_next_writes(1);

    let request = IndexUpdateRequest::upsert(id.clone(), EntityVersion(1));
    let receipt = strategy.deliver(&request).await.unwrap();
    assert_eq!(receipt, DeliveryReceipt::Enqueued);
    assert!(h.index.document(&id).is_none());

    // And a duplicate delivery of the same request.
    h.queues
        .queue("updates")
        .send(OutgoingMessage::from_request(&request).unwrap())
        .await
        .unwrap();

    let workers = h.deps.start_consumers().unwrap();
    assert_eq!(workers.len(), 2);

    let queue = h.queues.queue("updates");
    assert!(
        wait_until(|| queue.pending() == 0 && queue.in_flight() == 0).await,
        "queue did not drain"
    );
    workers.shutdown(Duration::from_secs(2)).await.unwrap();

    let doc = h.index.document(&id).unwrap();
    assert_eq!(doc.version, EntityVersion(1));
    assert_eq!(doc.fields["color"], "red");
    assert_eq!(h.index.len(), 1);
    assert!(h.index.write_count() >= 2);
    assert!(queue.dead_letters().is_empty());

    let metrics = h.deps.metrics().snapshot();
    assert_eq!(metrics.enqueued, 1);
    assert_eq!(metrics.applied, 1);
    assert!(metrics.released >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn out_of_order_versions_converge_on_the_highest() {
    let h = harness("queued", 2);
    let id = EntityId::new(Uuid::new_v4(), "widget");
    for (version, color) in [(1, "red"), (2, "green"), (3, "blue")] {
        h.store
            .put(Entity::new(id.clone(), EntityVersion(version)).with_field("color", color));
    }

    let strategy = h.deps.delivery_strategy().await.unwrap();
    for version in [3, 1, 2] {
        strategy
            .deliver(&IndexUpdateRequest::upsert(id.clone(), EntityVersion(version)))
            .await
            .unwrap();
    }

    let workers = h.deps.start_consumers().unwrap();
    let queue = h.queues.queue("updates");
    assert!(wait_until(|| queue.pending() == 0 && queue.in_flight() == 0).await);
    workers.shutdown(Duration::from_secs(2)).await.unwrap();

    let doc = h.index.document(&id).unwrap();
    assert_eq!(doc.version, EntityVersion(3));
    assert_eq!(doc.fields["color"], "blue");
}

#[tokio::test]
async fn local_mode_applies_immediately_and_runs_no_workers() {
    let h = harness("local", 2);
    let id = EntityId::new(Uuid::new_v4(), "widget");
    h.store.put(Entity::new(id.clone(), EntityVersion(1)));

    let strategy = h.deps.delivery_strategy().await.unwrap();
    let receipt = strategy
        .deliver(&IndexUpdateRequest::upsert(id.clone(), EntityVersion(1)))
        .await
        .unwrap();

    assert!(matches!(receipt, DeliveryReceipt::Applied(_)));
    assert!(h.index.document(&id).is_some());

    let workers = h.deps.start_consumers().unwrap();
    assert!(workers.is_empty());
    workers.shutdown(Duration::from_millis(100)).await.unwrap();
}

#[tokio::test]
async fn unknown_implementation_fails_at_first_use() {
    let h = harness("sqs", 1);

    let err = h.deps.delivery_strategy().await.unwrap_err();
    assert!(err.to_string().contains("allowed values are: local, queued"));
    assert!(h.deps.start_consumers().is_err());
}
