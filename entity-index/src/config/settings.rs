//! Indexer settings read from the environment.

use std::env;
use std::str::FromStr;

use crate::IndexingError;
use entity_index_delivery::{config::DEFAULT_QUEUE_NAME, DeliveryConfig, QueueImplementation};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default OpenSearch index name.
const DEFAULT_OPENSEARCH_INDEX: &str = "entities";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "entity-index";

/// Default number of deliveries before a message is dead-lettered.
const DEFAULT_MAX_RECEIVE_COUNT: u32 = 5;

/// Default number of consumer workers per process.
const DEFAULT_CONSUMER_WORKERS: usize = 1;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = IndexingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(IndexingError::config(format!(
                "unrecognized log format \"{}\"; allowed values are: text, json",
                other
            ))),
        }
    }
}

/// Settings for one indexer process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Delivery implementation name, validated on first strategy use.
    pub queue_implementation: String,
    /// Queue carrying index updates in queued mode.
    pub queue_name: String,
    /// OpenSearch server URL.
    pub opensearch_url: String,
    /// OpenSearch index holding entity documents.
    pub opensearch_index: String,
    /// Kafka broker addresses.
    pub kafka_broker: String,
    /// Kafka consumer group shared by all consumer workers.
    pub kafka_group_id: String,
    /// Queue receiving messages past `max_receive_count`.
    pub dead_letter_queue: String,
    /// Deliveries after which a failing message is dead-lettered.
    pub max_receive_count: u32,
    /// Consumer workers to run in queued mode. Zero runs none.
    pub consumer_workers: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl IndexerConfig {
    /// Load settings from the environment, after reading a `.env` file if
    /// one is present.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_QUEUE_IMPLEMENTATION`: `local` or `queued` (default: local)
    /// - `INDEX_QUEUE_NAME`: Queue name (default: entity-index-updates)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_INDEX`: Index name (default: entities)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: entity-index)
    /// - `INDEX_DEAD_LETTER_QUEUE`: Dead-letter queue (default: `<queue>.dead-letter`)
    /// - `INDEX_MAX_RECEIVE_COUNT`: Deliveries before dead-lettering (default: 5)
    /// - `INDEX_CONSUMER_WORKERS`: Consumer workers (default: 1)
    /// - `LOG_FORMAT`: `text` or `json` (default: text)
    pub fn from_env() -> Result<Self, IndexingError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let queue_name = string("INDEX_QUEUE_NAME", DEFAULT_QUEUE_NAME);
        let dead_letter_queue = string(
            "INDEX_DEAD_LETTER_QUEUE",
            &format!("{}.dead-letter", queue_name),
        );

        let max_receive_count = parse_number(
            "INDEX_MAX_RECEIVE_COUNT",
            lookup("INDEX_MAX_RECEIVE_COUNT"),
            DEFAULT_MAX_RECEIVE_COUNT,
        )?;
        if max_receive_count == 0 {
            return Err(IndexingError::config(
                "INDEX_MAX_RECEIVE_COUNT must be at least 1",
            ));
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            queue_implementation: string(
                "INDEX_QUEUE_IMPLEMENTATION",
                QueueImplementation::Local.as_str(),
            ),
            queue_name,
            opensearch_url: string("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            opensearch_index: string("OPENSEARCH_INDEX", DEFAULT_OPENSEARCH_INDEX),
            kafka_broker: string("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            kafka_group_id: string("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            dead_letter_queue,
            max_receive_count,
            consumer_workers: parse_number(
                "INDEX_CONSUMER_WORKERS",
                lookup("INDEX_CONSUMER_WORKERS"),
                DEFAULT_CONSUMER_WORKERS,
            )?,
            log_format,
        })
    }

    /// The settings the delivery strategy selector needs.
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig::new(&self.queue_implementation, &self.queue_name)
    }
}

fn parse_number<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, IndexingError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            IndexingError::config(format!("{} must be a non-negative integer, got \"{}\"", key, raw))
        }),
        _ => Ok(default),
    }
}
