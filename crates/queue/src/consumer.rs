//! Queue consumer/producer traits and types.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier from the queue provider.
    pub id: String,
    /// Raw message body (JSON string).
    pub body: String,
    /// Provider-specific handle for ack (e.g., SQS receipt handle).
    pub receipt_handle: String,
    /// When the message was sent to the queue.
    pub timestamp: DateTime<Utc>,
    /// Number of times this message has been received.
    pub attempt_count: u32,
}

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_message_count: Option<u64>,
    /// Queue provider name (e.g., "sqs", "memory").
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Consuming side of an at-least-once queue.
///
/// A received message stays invisible until its visibility window expires;
/// only [`ack`](QueueConsumer::ack) removes it for good.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Poll up to `max_messages` from the queue.
    ///
    /// Returns an empty vec if no messages are available.
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a message, removing it from the queue.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Check queue connectivity and return health status.
    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}

/// Producing side of the queue.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    /// Enqueue one message body; returns the provider's message id.
    async fn send(&self, body: &str) -> Result<String, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_message_serde_roundtrip() {
        let msg = QueueMessage {
            id: "msg-123".to_string(),
            body: r#"{"ID":"1","TYPE":"LINKS"}"#.to_string(),
            receipt_handle: "handle-abc".to_string(),
            timestamp: Utc::now(),
            attempt_count: 1,
        };

        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: QueueMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(msg.id, deserialized.id);
        assert_eq!(msg.body, deserialized.body);
        assert_eq!(msg.receipt_handle, deserialized.receipt_handle);
    }

    #[test]
    fn test_queue_health_display() {
        let health = QueueHealth {
            connected: true,
            approximate_message_count: Some(42),
            provider: "sqs".to_string(),
        };
        let display = format!("{}", health);
        assert!(display.contains("connected: true"));
        assert!(display.contains("42"));
    }
}
