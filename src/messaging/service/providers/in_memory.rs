//! # In-Memory Queue Backend
//!
//! Single-process priority queue for orchestration messages.
//!
//! ## Features
//!
//! - **Priority Ordering**: `(priority, created_at)` with insertion order as the final tie-break
//! - **In-Flight Tracking**: delivered messages are held until `ack`/`nack`
//! - **Lazy Expiration**: expired messages are swept on `get`/`peek`, no background timer
//! - **Cooperative Waiting**: `get` parks on a `Notify` instead of polling

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::message::{Message, MessagePriority, MessageStatus};
use crate::messaging::service::traits::QueueBackend;
use crate::messaging::service::types::BackendStats;

/// Pending message with its ordering key
#[derive(Debug)]
struct PendingEntry {
    priority: MessagePriority,
    created_at: DateTime<Utc>,
    /// Monotonic insertion counter
    sequence: u64,
    message: Message,
}

impl PendingEntry {
    fn key(&self) -> (MessagePriority, DateTime<Utc>, u64) {
        (self.priority, self.created_at, self.sequence)
    }
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    // BinaryHeap is a max-heap; the smallest key must surface first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: BinaryHeap<PendingEntry>,
    pending_ids: HashSet<String>,
    in_flight: HashMap<String, Message>,
    dead_letters: VecDeque<Message>,
    next_sequence: u64,
    completed_total: u64,
    failed_total: u64,
    expired_total: u64,
    requeued_total: u64,
}

impl QueueState {
    fn size(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }

    fn contains(&self, message_id: &str) -> bool {
        self.pending_ids.contains(message_id) || self.in_flight.contains_key(message_id)
    }

    fn push_pending(&mut self, message: Message) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.pending_ids.insert(message.id.clone());
        self.pending.push(PendingEntry {
            priority: message.priority,
            created_at: message.created_at,
            sequence,
            message,
        });
    }

    fn push_dead_letter(&mut self, message: Message, limit: usize) {
        if limit == 0 {
            return;
        }
        while self.dead_letters.len() >= limit {
            self.dead_letters.pop_front();
        }
        self.dead_letters.push_back(message);
    }

    /// Drop every pending message past its deadline
    fn sweep_expired(&mut self, now: DateTime<Utc>, dead_letter_limit: usize) -> usize {
        if !self.pending.iter().any(|entry| entry.message.is_expired_at(now)) {
            return 0;
        }

        let entries = std::mem::take(&mut self.pending).into_vec();
        let mut expired = 0;
        for entry in entries {
            if entry.message.is_expired_at(now) {
                let mut message = entry.message;
                self.pending_ids.remove(&message.id);
                message.status = MessageStatus::Expired;
                debug!(
                    message_id = %message.id,
                    receiver = %message.receiver,
                    priority = %message.priority,
                    "⌛ Message expired before delivery"
                );
                self.push_dead_letter(message, dead_letter_limit);
                expired += 1;
            } else {
                self.pending.push(entry);
            }
        }
        self.expired_total += expired as u64;
        expired
    }
}

/// In-memory priority queue backend
///
/// Pending and in-flight collections live behind one mutex; every operation
/// holds it only for a short synchronous section, never across an await.
#[derive(Debug)]
pub struct InMemoryQueueBackend {
    state: Mutex<QueueState>,
    capacity: Option<usize>,
    dead_letter_capacity: usize,
    message_available: Notify,
}

impl Default for InMemoryQueueBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InMemoryQueueBackend {
    /// Create a backend with an optional capacity bound
    pub fn new(capacity: Option<usize>) -> Self {
        Self::with_dead_letter_capacity(capacity, 1000)
    }

    pub fn with_dead_letter_capacity(capacity: Option<usize>, dead_letter_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity,
            dead_letter_capacity,
            message_available: Notify::new(),
        }
    }

    /// Create a backend from queue configuration
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::with_dead_letter_capacity(config.capacity, config.dead_letter_capacity)
    }

    fn try_dequeue(&self) -> Option<Message> {
        let mut state = self.state.lock();
        state.sweep_expired(Utc::now(), self.dead_letter_capacity);

        let entry = state.pending.pop()?;
        let mut message = entry.message;
        state.pending_ids.remove(&message.id);
        message.status = MessageStatus::Processing;
        state.in_flight.insert(message.id.clone(), message.clone());
        Some(message)
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueueBackend {
    async fn put(&self, mut message: Message) -> MessagingResult<()> {
        {
            let mut state = self.state.lock();

            if state.contains(&message.id) {
                return Err(MessagingError::duplicate_message(message.id));
            }

            if let Some(limit) = self.capacity {
                let current = state.size();
                if current >= limit {
                    warn!(
                        message_id = %message.id,
                        current_count = current,
                        limit_count = limit,
                        "Queue at capacity, rejecting message"
                    );
                    return Err(MessagingError::queue_full(current, limit));
                }
            }

            message.status = MessageStatus::Pending;
            state.push_pending(message);
        }

        self.message_available.notify_one();
        Ok(())
    }

    async fn get(&self, timeout: Duration) -> MessagingResult<Option<Message>> {
        let deadline = Instant::now() + timeout;

        loop {
            // Register interest before checking so a put between the check
            // and the wait is not missed.
            let notified = self.message_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_dequeue() {
                return Ok(Some(message));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.try_dequeue());
            }
        }
    }

    async fn peek(&self) -> MessagingResult<Option<Message>> {
        let mut state = self.state.lock();
        state.sweep_expired(Utc::now(), self.dead_letter_capacity);
        Ok(state.pending.peek().map(|entry| entry.message.clone()))
    }

    async fn ack(&self, message_id: &str) -> MessagingResult<()> {
        let mut state = self.state.lock();
        let mut message = state
            .in_flight
            .remove(message_id)
            .ok_or_else(|| MessagingError::message_not_found(message_id))?;

        message.status = MessageStatus::Completed;
        state.completed_total += 1;
        debug!(message_id = %message.id, receiver = %message.receiver, "Message acknowledged");
        Ok(())
    }

    async fn nack(&self, message_id: &str, requeue: bool) -> MessagingResult<MessageStatus> {
        let status = {
            let mut state = self.state.lock();
            let mut message = state
                .in_flight
                .remove(message_id)
                .ok_or_else(|| MessagingError::message_not_found(message_id))?;

            let retryable = message.can_retry();
            message.retry_count += 1;

            if requeue && retryable {
                message.status = MessageStatus::Retrying;
                debug!(
                    message_id = %message.id,
                    retry_count = message.retry_count,
                    max_retries = message.max_retries,
                    "🔄 Message requeued for retry"
                );
                state.requeued_total += 1;
                state.push_pending(message);
                MessageStatus::Retrying
            } else {
                message.status = MessageStatus::Failed;
                warn!(
                    message_id = %message.id,
                    receiver = %message.receiver,
                    retry_count = message.retry_count,
                    max_retries = message.max_retries,
                    requeue = requeue,
                    "Message failed permanently"
                );
                state.failed_total += 1;
                state.push_dead_letter(message, self.dead_letter_capacity);
                MessageStatus::Failed
            }
        };

        if status == MessageStatus::Retrying {
            self.message_available.notify_one();
        }
        Ok(status)
    }

    async fn size(&self) -> usize {
        self.state.lock().size()
    }

    async fn clear(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.pending_ids.clear();
        state.in_flight.clear();
        state.dead_letters.clear();
    }

    async fn stats(&self) -> BackendStats {
        let state = self.state.lock();
        BackendStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            capacity: self.capacity,
            completed_total: state.completed_total,
            failed_total: state.failed_total,
            expired_total: state.expired_total,
            requeued_total: state.requeued_total,
        }
    }

    async fn dead_letters(&self) -> Vec<Message> {
        self.state.lock().dead_letters.iter().cloned().collect()
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::Payload;

    fn message(id: &str, priority: MessagePriority) -> Message {
        Message::request("orchestrator", "cad_agent", Payload::new())
            .with_id(id)
            .with_priority(priority)
    }

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[tokio::test]
    async fn test_put_and_get() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("m1", MessagePriority::Normal)).await.unwrap();

        let received = backend.get(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(received.id, "m1");
        assert_eq!(received.status, MessageStatus::Processing);
        assert_eq!(backend.size().await, 1);

        backend.ack("m1").await.unwrap();
        assert_eq!(backend.size().await, 0);
    }

    #[tokio::test]
    async fn test_priority_preemption() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("low", MessagePriority::Low)).await.unwrap();
        backend.put(message("bg", MessagePriority::Background)).await.unwrap();
        backend.put(message("crit", MessagePriority::Critical)).await.unwrap();
        backend.put(message("normal", MessagePriority::Normal)).await.unwrap();

        let mut order = Vec::new();
        while let Some(msg) = backend.get(NO_WAIT).await.unwrap() {
            order.push(msg.id);
        }
        assert_eq!(order, vec!["crit", "normal", "low", "bg"]);
    }

    #[tokio::test]
    async fn test_fifo_within_priority() {
        let backend = InMemoryQueueBackend::default();
        let created_at = Utc::now();
        for id in ["a", "b", "c"] {
            let mut msg = message(id, MessagePriority::High);
            msg.created_at = created_at;
            backend.put(msg).await.unwrap();
        }

        let mut order = Vec::new();
        while let Some(msg) = backend.get(NO_WAIT).await.unwrap() {
            order.push(msg.id);
        }
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("dup", MessagePriority::Normal)).await.unwrap();

        let err = backend
            .put(message("dup", MessagePriority::High))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::DuplicateMessage { .. }));

        // Still a duplicate while in flight
        backend.get(NO_WAIT).await.unwrap();
        let err = backend
            .put(message("dup", MessagePriority::High))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::DuplicateMessage { .. }));
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let backend = InMemoryQueueBackend::new(Some(2));
        backend.put(message("1", MessagePriority::Normal)).await.unwrap();
        backend.put(message("2", MessagePriority::Normal)).await.unwrap();

        let err = backend
            .put(message("3", MessagePriority::Normal))
            .await
            .unwrap_err();
        assert!(err.is_capacity_error());

        // In-flight messages still count against capacity
        backend.get(NO_WAIT).await.unwrap();
        assert!(backend.put(message("3", MessagePriority::Normal)).await.is_err());
    }

    #[tokio::test]
    async fn test_ack_and_nack_unknown_id() {
        let backend = InMemoryQueueBackend::default();
        assert!(matches!(
            backend.ack("missing").await.unwrap_err(),
            MessagingError::MessageNotFound { .. }
        ));
        assert!(matches!(
            backend.nack("missing", true).await.unwrap_err(),
            MessagingError::MessageNotFound { .. }
        ));

        // Pending (not in flight) messages cannot be acknowledged either
        backend.put(message("p", MessagePriority::Normal)).await.unwrap();
        assert!(backend.ack("p").await.is_err());
    }

    #[tokio::test]
    async fn test_nack_requeue_until_exhausted() {
        let backend = InMemoryQueueBackend::default();
        backend
            .put(message("r", MessagePriority::Normal).with_max_retries(2))
            .await
            .unwrap();

        for expected_retry in 1..=2 {
            let msg = backend.get(NO_WAIT).await.unwrap().unwrap();
            assert_eq!(
                backend.nack(&msg.id, true).await.unwrap(),
                MessageStatus::Retrying
            );
            let peeked = backend.peek().await.unwrap().unwrap();
            assert_eq!(peeked.status, MessageStatus::Retrying);
            assert_eq!(peeked.retry_count, expected_retry);
        }

        let msg = backend.get(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(
            backend.nack(&msg.id, true).await.unwrap(),
            MessageStatus::Failed
        );
        assert!(backend.get(NO_WAIT).await.unwrap().is_none());
        assert_eq!(backend.size().await, 0);

        let dead = backend.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].status, MessageStatus::Failed);
        assert_eq!(dead[0].retry_count, 3);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_fails() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("n", MessagePriority::Normal)).await.unwrap();
        backend.get(NO_WAIT).await.unwrap();

        assert_eq!(
            backend.nack("n", false).await.unwrap(),
            MessageStatus::Failed
        );
        assert_eq!(backend.size().await, 0);
        assert_eq!(backend.stats().await.failed_total, 1);
    }

    #[tokio::test]
    async fn test_requeued_message_keeps_priority_position() {
        let backend = InMemoryQueueBackend::default();
        let first = message("first", MessagePriority::Normal);
        let mut second = message("second", MessagePriority::Normal);
        second.created_at = first.created_at + chrono::Duration::milliseconds(1);
        backend.put(first).await.unwrap();
        backend.put(second).await.unwrap();
        backend.put(message("urgent", MessagePriority::Critical)).await.unwrap();

        let urgent = backend.get(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(urgent.id, "urgent");
        let first = backend.get(NO_WAIT).await.unwrap().unwrap();
        backend.nack(&first.id, true).await.unwrap();

        // Older creation time wins over "second" within the normal class
        let next = backend.get(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(next.id, "first");
    }

    #[tokio::test]
    async fn test_expired_message_is_swept() {
        let backend = InMemoryQueueBackend::default();
        let past = Utc::now() - chrono::Duration::seconds(1);
        backend
            .put(message("old", MessagePriority::Critical).with_expires_at(past))
            .await
            .unwrap();
        assert_eq!(backend.size().await, 1);

        assert!(backend.peek().await.unwrap().is_none());
        assert_eq!(backend.size().await, 0);
        assert!(backend.get(NO_WAIT).await.unwrap().is_none());

        let stats = backend.stats().await;
        assert_eq!(stats.expired_total, 1);
        let dead = backend.dead_letters().await;
        assert_eq!(dead[0].status, MessageStatus::Expired);
    }

    #[tokio::test]
    async fn test_get_times_out_when_empty() {
        let backend = InMemoryQueueBackend::default();
        let started = std::time::Instant::now();
        let result = backend.get(Duration::from_millis(30)).await.unwrap();
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_get_wakes_on_put() {
        let backend = std::sync::Arc::new(InMemoryQueueBackend::default());
        let consumer = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.get(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.put(message("late", MessagePriority::Low)).await.unwrap();

        let received = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(received.id, "late");
    }

    #[tokio::test]
    async fn test_peek_does_not_remove() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("p", MessagePriority::Normal)).await.unwrap();

        let peeked = backend.peek().await.unwrap().unwrap();
        assert_eq!(peeked.status, MessageStatus::Pending);
        assert_eq!(backend.size().await, 1);
        assert_eq!(backend.stats().await.in_flight, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = InMemoryQueueBackend::default();
        backend.put(message("a", MessagePriority::Normal)).await.unwrap();
        backend.put(message("b", MessagePriority::Normal)).await.unwrap();
        backend.get(NO_WAIT).await.unwrap();

        backend.clear().await;
        assert_eq!(backend.size().await, 0);
        // Cleared ids may be reused
        backend.put(message("a", MessagePriority::Normal)).await.unwrap();
    }

    #[tokio::test]
    async fn test_dead_letter_ring_is_bounded() {
        let backend = InMemoryQueueBackend::with_dead_letter_capacity(None, 2);
        for id in ["x", "y", "z"] {
            backend.put(message(id, MessagePriority::Normal)).await.unwrap();
            let msg = backend.get(NO_WAIT).await.unwrap().unwrap();
            backend.nack(&msg.id, false).await.unwrap();
        }

        let dead: Vec<String> = backend
            .dead_letters()
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(dead, vec!["y", "z"]);
    }
}
