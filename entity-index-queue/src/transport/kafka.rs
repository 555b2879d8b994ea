//! Kafka queue transport.
//!
//! Index updates are produced to a topic keyed by entity identity and read
//! back by a consumer group with manual offset commits. Kafka has no
//! per-message redelivery, so a released message is republished to the
//! topic with an incremented receive-count header (or to the dead-letter
//! topic once the maximum is reached) before its offset is settled.
//!
//! Commits are cumulative per partition while messages settle in any order
//! across workers. Every received offset is tracked, and the committed
//! position only advances over a contiguous run of settled offsets.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Header, Headers, Message as KafkaMessage, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
    Offset, TopicPartitionList,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::{QueueTransport, QueueTransportFactory};
use crate::errors::QueueError;
use crate::messages::{OutgoingMessage, Receipt, ReceivedMessage};

/// Header carrying how many times a message has already been delivered.
const RECEIVE_COUNT_HEADER: &str = "receive-count";

/// How long to keep filling a batch once the first message has arrived.
const BATCH_FILL_WAIT: Duration = Duration::from_millis(10);

/// How long a seek back to an unreleased offset may take.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and delivery settings for a Kafka-backed queue.
#[derive(Debug, Clone)]
pub struct KafkaQueueConfig {
    /// Kafka broker addresses (comma-separated).
    pub brokers: String,
    /// Consumer group ID.
    pub group_id: String,
    /// Topic index updates are produced to and consumed from.
    pub topic: String,
    /// Topic that receives messages past `max_receive_count`.
    pub dead_letter_topic: String,
    /// Deliveries after which a failing message is dead-lettered.
    pub max_receive_count: u32,
    /// How long `send` waits for the broker to acknowledge a message.
    pub send_timeout: Duration,
}

impl KafkaQueueConfig {
    /// Create a config for `topic`, dead-lettering to `{topic}.dead-letter`.
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>, topic: &str) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topic: topic.to_string(),
            dead_letter_topic: format!("{}.dead-letter", topic),
            max_receive_count: 5,
            send_timeout: Duration::from_secs(5),
        }
    }
}

/// Received offsets of one partition that are not committed yet.
#[derive(Debug, Default)]
struct PartitionOffsets {
    /// Received, not yet acked or released.
    unsettled: BTreeSet<i64>,
    /// Settled, but held back by a lower unsettled offset.
    settled: BTreeSet<i64>,
}

impl PartitionOffsets {
    fn track(&mut self, offset: i64) {
        self.settled.remove(&offset);
        self.unsettled.insert(offset);
    }

    /// Settle `offset` and return the position to commit, if it moved.
    fn settle(&mut self, offset: i64) -> Option<i64> {
        self.unsettled.remove(&offset);
        self.settled.insert(offset);

        let position = match self.unsettled.first() {
            Some(&lowest) => lowest,
            None => self.settled.last()? + 1,
        };

        let covered = self.settled.range(..position).next_back().is_some();
        self.settled = self.settled.split_off(&position);
        covered.then_some(position)
    }
}

/// Per-partition bookkeeping of in-flight offsets.
#[derive(Debug, Default)]
struct OffsetTracker {
    partitions: Mutex<HashMap<(String, i32), PartitionOffsets>>,
}

impl OffsetTracker {
    fn track(&self, topic: &str, partition: i32, offset: i64) {
        let mut partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        partitions
            .entry((topic.to_string(), partition))
            .or_default()
            .track(offset);
    }

    /// Settle an offset, returning the new commit position for its partition.
    ///
    /// The position never passes an offset that is still unsettled.
    fn settle(&self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        let mut partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        partitions
            .entry((topic.to_string(), partition))
            .or_default()
            .settle(offset)
    }
}

/// Kafka queue transport.
pub struct KafkaQueue {
    producer: FutureProducer,
    consumer: OnceCell<StreamConsumer>,
    offsets: OffsetTracker,
    config: KafkaQueueConfig,
}

impl KafkaQueue {
    /// Create a new Kafka queue.
    ///
    /// Only the producer is created here; the consumer joins its group on
    /// the first `receive`, so write-path processes never join it.
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaQueue)` - A new transport instance
    /// * `Err(QueueError)` - If producer creation fails
    pub fn new(config: KafkaQueueConfig) -> Result<Self, QueueError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("compression.type", "zstd")
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .create()
            .map_err(|e| QueueError::kafka(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            dead_letter_topic = %config.dead_letter_topic,
            "Created Kafka queue producer"
        );

        Ok(Self {
            producer,
            consumer: OnceCell::new(),
            offsets: OffsetTracker::default(),
            config,
        })
    }

    async fn consumer(&self) -> Result<&StreamConsumer, QueueError> {
        self.consumer
            .get_or_try_init(|| async {
                let consumer: StreamConsumer = ClientConfig::new()
                    .set("bootstrap.servers", &self.config.brokers)
                    .set("group.id", &self.config.group_id)
                    .set("enable.auto.commit", "false")
                    .set("auto.offset.reset", "earliest")
                    .set("session.timeout.ms", "6000")
                    .create()
                    .map_err(|e| QueueError::kafka(e.to_string()))?;

                consumer
                    .subscribe(&[self.config.topic.as_str()])
                    .map_err(|e| QueueError::kafka(e.to_string()))?;

                info!(
                    topic = %self.config.topic,
                    group_id = %self.config.group_id,
                    "Subscribed to Kafka topic"
                );
                Ok::<_, QueueError>(consumer)
            })
            .await
    }

    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        delivered: u32,
    ) -> Result<(), QueueError> {
        let delivered = delivered.to_string();
        let headers = OwnedHeaders::new().insert(Header {
            key: RECEIVE_COUNT_HEADER,
            value: Some(delivered.as_str()),
        });

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(headers);

        self.producer
            .send(record, self.config.send_timeout)
            .await
            .map_err(|(e, _)| QueueError::kafka(e.to_string()))?;

        Ok(())
    }

    /// Mark a message done and commit whatever contiguous prefix that frees.
    fn settle(&self, consumer: &StreamConsumer, receipt: &Receipt) -> Result<(), QueueError> {
        let (topic, partition, offset) = kafka_position(receipt)?;

        let Some(position) = self.offsets.settle(topic, partition, offset) else {
            debug!(topic, partition, offset, "Offset settled behind an unsettled one");
            return Ok(());
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(position))
            .map_err(|e| QueueError::kafka(e.to_string()))?;

        consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| QueueError::kafka(e.to_string()))?;

        debug!(topic, partition, position, "Committed offset");
        Ok(())
    }

    /// Copy a borrowed Kafka message into an owned received message.
    fn to_received(msg: &BorrowedMessage<'_>) -> ReceivedMessage {
        let delivered_before = msg
            .headers()
            .and_then(|headers| {
                headers
                    .iter()
                    .find(|header| header.key == RECEIVE_COUNT_HEADER)
            })
            .and_then(|header| header.value)
            .and_then(|value| std::str::from_utf8(value).ok())
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);

        ReceivedMessage {
            receipt: Receipt::Kafka {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
            },
            key: msg
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned()),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            receive_count: delivered_before + 1,
        }
    }
}

#[async_trait]
impl QueueTransport for KafkaQueue {
    #[instrument(skip(self, message), fields(key = %message.key))]
    async fn send(&self, message: OutgoingMessage) -> Result<(), QueueError> {
        self.publish(&self.config.topic, &message.key, &message.payload, 0)
            .await?;
        debug!(topic = %self.config.topic, "Produced message");
        Ok(())
    }

    async fn receive(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let consumer = self.consumer().await?;
        let mut received = Vec::new();
        let mut wait_for = wait;

        while received.len() < max {
            match tokio::time::timeout(wait_for, consumer.recv()).await {
                Err(_) => break,
                Ok(Ok(msg)) => {
                    debug!(
                        topic = %msg.topic(),
                        partition = msg.partition(),
                        offset = msg.offset(),
                        "Received message"
                    );
                    self.offsets
                        .track(msg.topic(), msg.partition(), msg.offset());
                    received.push(Self::to_received(&msg));
                    wait_for = BATCH_FILL_WAIT;
                }
                Ok(Err(e)) if received.is_empty() => return Err(e.into()),
                Ok(Err(e)) => {
                    warn!(error = %e, "Kafka error while filling batch");
                    break;
                }
            }
        }

        Ok(received)
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let consumer = self.consumer().await?;
        self.settle(consumer, &message.receipt)
    }

    #[instrument(skip(self, message), fields(receive_count = message.receive_count))]
    async fn release(&self, message: ReceivedMessage) -> Result<(), QueueError> {
        let (topic, partition, offset) = kafka_position(&message.receipt)?;
        let key = message.key.clone().unwrap_or_default();

        let destination = if message.receive_count >= self.config.max_receive_count {
            warn!(
                key = %key,
                dead_letter_topic = %self.config.dead_letter_topic,
                "Message exceeded max receive count, moving to dead letters"
            );
            &self.config.dead_letter_topic
        } else {
            &self.config.topic
        };

        let consumer = self.consumer().await?;

        // The offset stays unsettled until the copy is durable elsewhere.
        if let Err(e) = self
            .publish(destination, &key, &message.payload, message.receive_count)
            .await
        {
            warn!(
                topic,
                partition,
                offset,
                error = %e,
                "Republish failed, seeking back so the message is read again"
            );
            if let Err(seek) = consumer.seek(topic, partition, Offset::Offset(offset), SEEK_TIMEOUT)
            {
                warn!(error = %seek, "Seek failed, message is redelivered after restart");
            }
            return Err(e);
        }

        self.settle(consumer, &message.receipt)
    }
}

fn kafka_position(receipt: &Receipt) -> Result<(&str, i32, i64), QueueError> {
    match receipt {
        Receipt::Kafka {
            topic,
            partition,
            offset,
        } => Ok((topic.as_str(), *partition, *offset)),
        other => Err(QueueError::invalid_receipt(format!(
            "{:?} does not belong to a Kafka queue",
            other
        ))),
    }
}

/// Creates one Kafka queue per topic, sharing broker and group settings.
pub struct KafkaQueueFactory {
    brokers: String,
    group_id: String,
    max_receive_count: u32,
    dead_letter_topic: Option<String>,
    queues: Mutex<HashMap<String, Arc<KafkaQueue>>>,
}

impl KafkaQueueFactory {
    /// Create a factory for the given brokers and consumer group.
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            max_receive_count: 5,
            dead_letter_topic: None,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Set the delivery count after which messages are dead-lettered.
    pub fn with_max_receive_count(mut self, max_receive_count: u32) -> Self {
        self.max_receive_count = max_receive_count;
        self
    }

    /// Override the dead-letter topic (default `{topic}.dead-letter`).
    pub fn with_dead_letter_topic(mut self, topic: impl Into<String>) -> Self {
        self.dead_letter_topic = Some(topic.into());
        self
    }

    fn queue_config(&self, queue_name: &str) -> KafkaQueueConfig {
        let mut config = KafkaQueueConfig::new(&self.brokers, &self.group_id, queue_name);
        config.max_receive_count = self.max_receive_count;
        if let Some(topic) = &self.dead_letter_topic {
            config.dead_letter_topic = topic.clone();
        }
        config
    }
}

impl QueueTransportFactory for KafkaQueueFactory {
    fn transport(&self, queue_name: &str) -> Result<Arc<dyn QueueTransport>, QueueError> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = queues.get(queue_name) {
            return Ok(queue.clone());
        }

        let queue = Arc::new(KafkaQueue::new(self.queue_config(queue_name))?);
        queues.insert(queue_name.to_string(), queue.clone());
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dead_letter_topic() {
        let config = KafkaQueueConfig::new("localhost:9092", "entity-index", "index-updates");

        assert_eq!(config.topic, "index-updates");
        assert_eq!(config.dead_letter_topic, "index-updates.dead-letter");
        assert_eq!(config.max_receive_count, 5);
    }

    #[test]
    fn test_factory_queue_config() {
        let factory = KafkaQueueFactory::new("localhost:9092", "entity-index")
            .with_max_receive_count(8)
            .with_dead_letter_topic("index-poison");

        let config = factory.queue_config("index-updates");

        assert_eq!(config.group_id, "entity-index");
        assert_eq!(config.max_receive_count, 8);
        assert_eq!(config.dead_letter_topic, "index-poison");
    }

    #[test]
    fn test_in_order_settles_commit_past_each_offset() {
        let tracker = OffsetTracker::default();
        tracker.track("updates", 0, 10);
        tracker.track("updates", 0, 11);

        assert_eq!(tracker.settle("updates", 0, 10), Some(11));
        assert_eq!(tracker.settle("updates", 0, 11), Some(12));
    }

    #[test]
    fn test_commit_waits_for_lower_unsettled_offset() {
        let tracker = OffsetTracker::default();
        for offset in [10, 11, 12] {
            tracker.track("updates", 0, offset);
        }

        // Another worker finishes later offsets first.
        assert_eq!(tracker.settle("updates", 0, 12), None);
        assert_eq!(tracker.settle("updates", 0, 11), None);
        assert_eq!(tracker.settle("updates", 0, 10), Some(13));
    }

    #[test]
    fn test_unreleased_offset_blocks_later_acks() {
        let tracker = OffsetTracker::default();
        tracker.track("updates", 0, 10);
        tracker.track("updates", 0, 11);

        // Offset 10 failed to republish and is never settled.
        assert_eq!(tracker.settle("updates", 0, 11), None);
        tracker.track("updates", 0, 12);
        assert_eq!(tracker.settle("updates", 0, 12), None);

        // Read again after the seek back, then released successfully.
        tracker.track("updates", 0, 10);
        assert_eq!(tracker.settle("updates", 0, 10), Some(13));
    }

    #[test]
    fn test_partitions_commit_independently() {
        let tracker = OffsetTracker::default();
        tracker.track("updates", 0, 5);
        tracker.track("updates", 1, 7);

        assert_eq!(tracker.settle("updates", 1, 7), Some(8));
        assert_eq!(tracker.settle("updates", 0, 5), Some(6));
    }

    #[test]
    fn test_receipt_from_another_transport_is_rejected() {
        assert!(kafka_position(&Receipt::Memory(3)).is_err());
    }
}
