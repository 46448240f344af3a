//! # Message Queue Client
//!
//! Higher-level facade over a [`QueueBackend`] exposing send/receive/acknowledge/reject
//! and running statistics. Callers never touch the backend directly, so a persisted
//! backend can replace the in-memory one without changes elsewhere.
//!
//! ## Usage
//!
//! ```rust
//! use fabflow_core::messaging::{Message, MessageQueue, Payload};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let queue = MessageQueue::in_memory(None);
//!
//! let id = queue
//!     .send(Message::request("orchestrator", "cad_agent", Payload::new()))
//!     .await
//!     .unwrap();
//!
//! let message = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();
//! assert_eq!(message.id, id);
//! queue.acknowledge(&message.id).await.unwrap();
//! # });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::errors::MessagingResult;
use super::message::{Message, MessageStatus};
use super::service::{InMemoryQueueBackend, QueueBackend};
use crate::config::QueueConfig;
use crate::logging::log_queue_operation;

/// Running counters kept by the facade
#[derive(Debug, Default)]
struct QueueCounters {
    sent: AtomicU64,
    send_errors: AtomicU64,
    received: AtomicU64,
    acknowledged: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub provider: String,
    pub sent: u64,
    pub send_errors: u64,
    pub received: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub pending: usize,
    pub in_flight: usize,
    pub expired: u64,
    pub failed: u64,
    pub requeued: u64,
}

/// Queue facade used by the orchestrator and the capability dispatcher
pub struct MessageQueue {
    backend: Arc<dyn QueueBackend>,
    counters: QueueCounters,
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("provider", &self.backend.provider_name())
            .finish()
    }
}

impl MessageQueue {
    /// Wrap an existing backend
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self {
            backend,
            counters: QueueCounters::default(),
        }
    }

    /// Create a facade over an in-memory backend
    pub fn in_memory(capacity: Option<usize>) -> Self {
        Self::new(Arc::new(InMemoryQueueBackend::new(capacity)))
    }

    /// Create a facade over an in-memory backend built from configuration
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(Arc::new(InMemoryQueueBackend::from_config(config)))
    }

    /// Enqueue a message, returning its id
    pub async fn send(&self, message: Message) -> MessagingResult<String> {
        let message_id = message.id.clone();
        let receiver = message.receiver.clone();
        let priority = message.priority;

        match self.backend.put(message).await {
            Ok(()) => {
                self.counters.sent.fetch_add(1, Ordering::Relaxed);
                log_queue_operation(
                    "send",
                    &message_id,
                    &receiver,
                    "pending",
                    Some(&format!("priority={priority}")),
                );
                Ok(message_id)
            }
            Err(err) => {
                self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(message_id = %message_id, receiver = %receiver, error = %err, "Send failed");
                Err(err)
            }
        }
    }

    /// Receive the next message, waiting up to `timeout`
    pub async fn receive(&self, timeout: Duration) -> MessagingResult<Option<Message>> {
        let message = self.backend.get(timeout).await?;
        if let Some(message) = &message {
            self.counters.received.fetch_add(1, Ordering::Relaxed);
            debug!(
                message_id = %message.id,
                receiver = %message.receiver,
                retry_count = message.retry_count,
                "📥 Message received"
            );
        }
        Ok(message)
    }

    /// Acknowledge an in-flight message
    pub async fn acknowledge(&self, message_id: &str) -> MessagingResult<()> {
        self.backend.ack(message_id).await?;
        self.counters.acknowledged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reject an in-flight message, optionally returning it to the queue
    pub async fn reject(&self, message_id: &str, requeue: bool) -> MessagingResult<MessageStatus> {
        let status = self.backend.nack(message_id, requeue).await?;
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        Ok(status)
    }

    /// Look at the next deliverable message without consuming it
    pub async fn peek(&self) -> MessagingResult<Option<Message>> {
        self.backend.peek().await
    }

    /// Pending plus in-flight messages
    pub async fn size(&self) -> usize {
        self.backend.size().await
    }

    pub async fn is_empty(&self) -> bool {
        self.size().await == 0
    }

    /// Drop all queued and in-flight messages
    pub async fn clear(&self) {
        self.backend.clear().await;
    }

    /// Recently failed or expired messages
    pub async fn dead_letters(&self) -> Vec<Message> {
        self.backend.dead_letters().await
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Combined facade and backend statistics
    pub async fn stats(&self) -> QueueStatistics {
        let backend = self.backend.stats().await;
        QueueStatistics {
            provider: self.backend.provider_name().to_string(),
            sent: self.counters.sent.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
            received: self.counters.received.load(Ordering::Relaxed),
            acknowledged: self.counters.acknowledged.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            pending: backend.pending,
            in_flight: backend.in_flight,
            expired: backend.expired_total,
            failed: backend.failed_total,
            requeued: backend.requeued_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::message::{MessagePriority, Payload};

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[tokio::test]
    async fn test_send_receive_acknowledge() {
        let queue = MessageQueue::in_memory(None);
        let id = queue
            .send(Message::request("orchestrator", "research_agent", Payload::new()))
            .await
            .unwrap();

        let message = queue.receive(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(message.id, id);
        queue.acknowledge(&id).await.unwrap();
        assert!(queue.is_empty().await);

        let stats = queue.stats().await;
        assert_eq!(stats.provider, "in_memory");
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.received, 1);
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_reject_counts_and_requeues() {
        let queue = MessageQueue::in_memory(None);
        queue
            .send(
                Message::request("orchestrator", "printer_agent", Payload::new())
                    .with_priority(MessagePriority::High),
            )
            .await
            .unwrap();

        let message = queue.receive(NO_WAIT).await.unwrap().unwrap();
        let status = queue.reject(&message.id, true).await.unwrap();
        assert_eq!(status, MessageStatus::Retrying);

        let stats = queue.stats().await;
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_send_errors_are_counted() {
        let queue = MessageQueue::in_memory(Some(1));
        queue
            .send(Message::request("a", "b", Payload::new()))
            .await
            .unwrap();
        assert!(queue
            .send(Message::request("a", "b", Payload::new()))
            .await
            .is_err());

        let stats = queue.stats().await;
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.send_errors, 1);
    }
}
