//! In-memory queue transport.
//!
//! Models the delivery semantics of a hosted queue inside one process:
//! received messages stay invisible for a visibility timeout and reappear if
//! they are neither acknowledged nor released, and a message that has been
//! delivered `max_receive_count` times without success moves to a
//! dead-letter list instead of being redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{QueueTransport, QueueTransportFactory};
use crate::errors::QueueError;
use crate::messages::{OutgoingMessage, QueuedMessage, Receipt, ReceivedMessage};

/// Delivery settings for an in-memory queue.
#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// How long a received message stays invisible before it is redelivered.
    pub visibility_timeout: Duration,
    /// Deliveries after which a failing message is dead-lettered.
    pub max_receive_count: u32,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    key: String,
    payload: Vec<u8>,
    receive_count: u32,
}

impl Entry {
    fn into_queued(self) -> QueuedMessage {
        QueuedMessage {
            key: self.key,
            payload: self.payload,
            receive_count: self.receive_count,
        }
    }
}

#[derive(Default)]
struct State {
    next_id: u64,
    ready: VecDeque<Entry>,
    in_flight: HashMap<u64, (Entry, Instant)>,
    dead_letters: Vec<QueuedMessage>,
}

impl State {
    /// Return expired in-flight messages to the ready queue.
    fn reclaim_expired(&mut self, now: Instant, max_receive_count: u32) {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some((entry, _)) = self.in_flight.remove(&id) {
                debug!(message_id = id, "Visibility timeout elapsed, message visible again");
                self.requeue_or_dead_letter(entry, max_receive_count);
            }
        }
    }

    fn requeue_or_dead_letter(&mut self, entry: Entry, max_receive_count: u32) {
        if entry.receive_count >= max_receive_count {
            warn!(
                message_id = entry.id,
                key = %entry.key,
                receive_count = entry.receive_count,
                "Message exceeded max receive count, moving to dead letters"
            );
            self.dead_letters.push(entry.into_queued());
        } else {
            self.ready.push_back(entry);
        }
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|(_, deadline)| *deadline).min()
    }
}

/// Thread-safe in-memory queue.
pub struct InMemoryQueue {
    name: String,
    config: InMemoryQueueConfig,
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new(name: impl Into<String>, config: InMemoryQueueConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// The queue's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages waiting to be received.
    pub fn pending(&self) -> usize {
        self.lock().ready.len()
    }

    /// Messages received but neither acknowledged nor released.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Messages removed from normal flow after too many deliveries.
    pub fn dead_letters(&self) -> Vec<QueuedMessage> {
        self.lock().dead_letters.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn message_id(receipt: &Receipt) -> Result<u64, QueueError> {
        match receipt {
            Receipt::Memory(id) => Ok(*id),
            other => Err(QueueError::invalid_receipt(format!(
                "{:?} does not belong to an in-memory queue",
                other
            ))),
        }
    }

    /// Take up to `max` visible messages, marking them in flight.
    fn take_ready(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let mut state = self.lock();
        state.reclaim_expired(now, self.config.max_receive_count);

        let mut received = Vec::new();
        while received.len() < max {
            let Some(mut entry) = state.ready.pop_front() else {
                break;
            };
            entry.receive_count += 1;
            received.push(ReceivedMessage {
                receipt: Receipt::Memory(entry.id),
                key: Some(entry.key.clone()),
                payload: entry.payload.clone(),
                receive_count: entry.receive_count,
            });
            let deadline = now + self.config.visibility_timeout;
            state.in_flight.insert(entry.id, (entry, deadline));
        }

        (received, state.earliest_deadline())
    }
}

#[async_trait]
impl QueueTransport for InMemoryQueue {
    async fn send(&self, message: OutgoingMessage) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.ready.push_back(Entry {
                id,
                key: message.key,
                payload: message.payload,
                receive_count: 0,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            let (received, next_expiry) = self.take_ready(max);
            if !received.is_empty() {
                return Ok(received);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            // Sleep until a send wakes us, an in-flight message expires, or
            // the caller's wait runs out.
            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn ack(&self, message: &ReceivedMessage) -> Result<(), QueueError> {
        let id = Self::message_id(&message.receipt)?;
        if self.lock().in_flight.remove(&id).is_none() {
            debug!(message_id = id, "Ack for message no longer in flight");
        }
        Ok(())
    }

    async fn release(&self, message: ReceivedMessage) -> Result<(), QueueError> {
        let id = Self::message_id(&message.receipt)?;
        {
            let mut state = self.lock();
            match state.in_flight.remove(&id) {
                Some((entry, _)) => {
                    state.requeue_or_dead_letter(entry, self.config.max_receive_count)
                }
                None => {
                    debug!(message_id = id, "Release for message no longer in flight");
                    return Ok(());
                }
            }
        }
        self.notify.notify_one();
        Ok(())
    }
}

/// Hands out one shared in-memory queue per name.
#[derive(Default)]
pub struct InMemoryQueueFactory {
    config: InMemoryQueueConfig,
    queues: Mutex<HashMap<String, Arc<InMemoryQueue>>>,
}

impl InMemoryQueueFactory {
    /// Create a factory whose queues use `config`.
    pub fn new(config: InMemoryQueueConfig) -> Self {
        Self {
            config,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the named queue.
    pub fn queue(&self, queue_name: &str) -> Arc<InMemoryQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues
            .entry(queue_name.to_string())
            .or_insert_with(|| Arc::new(InMemoryQueue::new(queue_name, self.config.clone())))
            .clone()
    }
}

impl QueueTransportFactory for InMemoryQueueFactory {
    fn transport(&self, queue_name: &str) -> Result<Arc<dyn QueueTransport>, QueueError> {
        Ok(self.queue(queue_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: &str) -> OutgoingMessage {
        OutgoingMessage {
            key: key.to_string(),
            payload: key.as_bytes().to_vec(),
        }
    }

    fn queue(max_receive_count: u32) -> InMemoryQueue {
        InMemoryQueue::new(
            "test",
            InMemoryQueueConfig {
                visibility_timeout: Duration::from_secs(10),
                max_receive_count,
            },
        )
    }

    #[tokio::test]
    async fn test_send_receive_ack() {
        let queue = queue(3);
        queue.send(message("a")).await.unwrap();
        queue.send(message("b")).await.unwrap();

        let received = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].key.as_deref(), Some("a"));
        assert_eq!(received[0].receive_count, 1);
        assert_eq!(queue.in_flight(), 2);

        for msg in &received {
            queue.ack(msg).await.unwrap();
        }
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_receive_respects_max() {
        let queue = queue(3);
        for key in ["a", "b", "c"] {
            queue.send(message(key)).await.unwrap();
        }

        let received = queue.receive(2, Duration::from_millis(10)).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(queue.pending(), 1);
    }

    #[tokio::test]
    async fn test_receive_times_out_empty() {
        let queue = queue(3);
        let received = queue.receive(1, Duration::from_millis(20)).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_release_redelivers_then_dead_letters() {
        let queue = queue(2);
        queue.send(message("poison")).await.unwrap();

        let first = queue.receive(1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first[0].receive_count, 1);
        queue.release(first.into_iter().next().unwrap()).await.unwrap();
        assert_eq!(queue.pending(), 1);

        let second = queue.receive(1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(second[0].receive_count, 2);
        queue.release(second.into_iter().next().unwrap()).await.unwrap();

        assert_eq!(queue.pending(), 0);
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].key, "poison");
        assert_eq!(dead[0].receive_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_message_reappears_after_visibility_timeout() {
        let queue = queue(3);
        queue.send(message("a")).await.unwrap();

        let first = queue.receive(1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);

        // Consumer "crashes": never acks. Nothing is visible before the timeout.
        let none = queue.receive(1, Duration::from_secs(1)).await.unwrap();
        assert!(none.is_empty());

        let again = queue.receive(1, Duration::from_secs(30)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_receive_wakes_on_send() {
        let queue = Arc::new(queue(3));

        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive(1, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(message("late")).await.unwrap();

        let received = receiver.await.unwrap().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].key.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_foreign_receipt_rejected() {
        let queue = queue(3);
        let foreign = ReceivedMessage {
            receipt: Receipt::Kafka {
                topic: "t".to_string(),
                partition: 0,
                offset: 1,
            },
            key: None,
            payload: Vec::new(),
            receive_count: 1,
        };

        assert!(matches!(
            queue.ack(&foreign).await,
            Err(QueueError::InvalidReceipt(_))
        ));
    }

    #[test]
    fn test_factory_shares_queues_by_name() {
        let factory = InMemoryQueueFactory::new(InMemoryQueueConfig::default());

        let a = factory.queue("updates");
        let b = factory.queue("updates");
        let c = factory.queue("other");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
