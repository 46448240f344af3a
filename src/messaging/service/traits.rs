//! # Queue Backend Traits
//!
//! Core trait definition for provider-agnostic priority queues.

use std::time::Duration;

use async_trait::async_trait;

use super::types::BackendStats;
use crate::messaging::errors::MessagingResult;
use crate::messaging::message::{Message, MessageStatus};

/// Priority queue backend - provider-agnostic operations
///
/// Implementations store pending messages ordered by `(priority, created_at)`
/// and track delivered-but-unacknowledged messages in an in-flight table.
/// A message id is held by at most one of the two collections at a time.
///
/// The in-memory provider is the only one shipped; a persisted provider can
/// implement the same contract without callers changing.
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    /// Insert a message as pending
    ///
    /// Fails with `QueueFull` when a bounded backend is at capacity and with
    /// `DuplicateMessage` when the id is already pending or in flight.
    async fn put(&self, message: Message) -> MessagingResult<()>;

    /// Remove the highest-priority, oldest pending message and move it in flight
    ///
    /// Expired pending messages are swept before selection. Returns `None`
    /// when nothing becomes available within `timeout`.
    async fn get(&self, timeout: Duration) -> MessagingResult<Option<Message>>;

    /// Return the message `get` would deliver next without removing it
    async fn peek(&self) -> MessagingResult<Option<Message>>;

    /// Mark an in-flight message completed and drop it
    async fn ack(&self, message_id: &str) -> MessagingResult<()>;

    /// Return an in-flight message to the queue or fail it
    ///
    /// Increments the retry count. With `requeue` set and retries left, the
    /// message competes again on its original priority with status `Retrying`;
    /// otherwise it is marked `Failed` and dropped. Returns the resulting status.
    async fn nack(&self, message_id: &str, requeue: bool) -> MessagingResult<MessageStatus>;

    /// Pending count plus in-flight count
    async fn size(&self) -> usize;

    /// Drop every pending and in-flight message
    async fn clear(&self);

    /// Snapshot of backend counters
    async fn stats(&self) -> BackendStats;

    /// Recently failed or expired messages, oldest first
    async fn dead_letters(&self) -> Vec<Message>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
