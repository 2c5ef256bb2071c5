//! In-process queue with SQS-like at-least-once semantics.
//!
//! Used for local dry runs and tests. Received messages move to an
//! in-flight set until acked; [`MemoryQueue::expire_in_flight`] simulates
//! the visibility timeout lapsing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage, QueueProducer};
use crate::error::QueueError;

#[derive(Debug, Clone)]
struct Stored {
    id: String,
    body: String,
    sent_at: DateTime<Utc>,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct State {
    visible: VecDeque<Stored>,
    in_flight: HashMap<String, Stored>,
    ack_calls: Vec<String>,
    deleted: Vec<String>,
    fail_sends: bool,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `send` calls fail (simulates a provider outage).
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Bodies currently waiting to be received.
    pub fn visible_bodies(&self) -> Vec<String> {
        self.lock().visible.iter().map(|m| m.body.clone()).collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Every receipt handle passed to `ack`, in call order (duplicates kept).
    pub fn ack_calls(&self) -> Vec<String> {
        self.lock().ack_calls.clone()
    }

    /// Ids of messages removed by an ack.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Return every in-flight message to the visible queue.
    pub fn expire_in_flight(&self) {
        let mut state = self.lock();
        let expired: Vec<Stored> = state.in_flight.drain().map(|(_, m)| m).collect();
        state.visible.extend(expired);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let mut state = self.lock();
        let mut out = Vec::new();
        while out.len() < max_messages as usize {
            let Some(mut stored) = state.visible.pop_front() else {
                break;
            };
            stored.receive_count += 1;
            let receipt_handle = Uuid::new_v4().to_string();
            out.push(QueueMessage {
                id: stored.id.clone(),
                body: stored.body.clone(),
                receipt_handle: receipt_handle.clone(),
                timestamp: stored.sent_at,
                attempt_count: stored.receive_count,
            });
            state.in_flight.insert(receipt_handle, stored);
        }
        Ok(out)
    }

    /// Acking an already-deleted receipt succeeds, as SQS does.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.lock();
        state.ack_calls.push(receipt_handle.to_string());
        if let Some(stored) = state.in_flight.remove(receipt_handle) {
            state.deleted.push(stored.id);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some(self.lock().visible.len() as u64),
            provider: "memory".to_string(),
        })
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let mut state = self.lock();
        if state.fail_sends {
            return Err(QueueError::Send("memory queue configured to fail".into()));
        }
        let id = Uuid::new_v4().to_string();
        state.visible.push_back(Stored {
            id: id.clone(),
            body: body.to_string(),
            sent_at: Utc::now(),
            receive_count: 0,
        });
        Ok(id)
    }
}
