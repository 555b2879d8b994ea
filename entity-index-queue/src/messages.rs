//! Message types for queue transports.
//!
//! Defines the envelopes that flow through a transport and the wire codec for
//! index-update requests.

use crate::errors::QueueError;
use entity_index_shared::IndexUpdateRequest;

/// A message to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Partitioning key. Messages with the same key land on the same
    /// partition of a partitioned transport.
    pub key: String,
    /// Encoded body.
    pub payload: Vec<u8>,
}

impl OutgoingMessage {
    /// Encode an index-update request, keyed by its entity identity.
    pub fn from_request(request: &IndexUpdateRequest) -> Result<Self, QueueError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| QueueError::codec(format!("Failed to encode index update: {}", e)))?;

        Ok(Self {
            key: request.entity_id.to_string(),
            payload,
        })
    }
}

/// Where a received message came from, used to acknowledge or release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// Message held by an in-memory queue.
    Memory(u64),
    /// Message read from a Kafka partition.
    Kafka {
        topic: String,
        partition: i32,
        offset: i64,
    },
}

/// A message handed to a consumer.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Handle for `ack` / `release`.
    pub receipt: Receipt,
    /// Partitioning key, if the message had one.
    pub key: Option<String>,
    /// Encoded body.
    pub payload: Vec<u8>,
    /// How many times this message has been delivered, including this one.
    pub receive_count: u32,
}

impl ReceivedMessage {
    /// Decode the index-update request carried by this message.
    pub fn decode_request(&self) -> Result<IndexUpdateRequest, QueueError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| QueueError::codec(format!("Failed to decode index update: {}", e)))
    }
}

/// A message at rest in a queue, e.g. on a dead-letter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    /// Partitioning key.
    pub key: String,
    /// Encoded body.
    pub payload: Vec<u8>,
    /// How many times the message was delivered.
    pub receive_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_index_shared::{EntityId, EntityVersion, IndexOperation};
    use uuid::Uuid;

    #[test]
    fn test_request_survives_the_wire() {
        let request =
            IndexUpdateRequest::delete(EntityId::new(Uuid::new_v4(), "widget"), EntityVersion(9));

        let outgoing = OutgoingMessage::from_request(&request).unwrap();
        assert_eq!(outgoing.key, request.entity_id.to_string());

        let received = ReceivedMessage {
            receipt: Receipt::Memory(1),
            key: Some(outgoing.key),
            payload: outgoing.payload,
            receive_count: 1,
        };
        let decoded = received.decode_request().unwrap();

        assert_eq!(decoded, request);
        assert_eq!(decoded.operation, IndexOperation::Delete);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let received = ReceivedMessage {
            receipt: Receipt::Memory(1),
            key: None,
            payload: b"not json".to_vec(),
            receive_count: 1,
        };

        assert!(matches!(
            received.decode_request(),
            Err(QueueError::CodecError(_))
        ));
    }
}
