//! # Messaging Module
//!
//! In-process priority message queue used to route work between the
//! orchestrator and pipeline capabilities.

pub mod client;
pub mod errors;
pub mod message;
pub mod service;

pub use client::{MessageQueue, QueueStatistics};
pub use errors::{MessagingError, MessagingResult};
pub use message::{
    CapabilityResponse, Message, MessagePriority, MessageStatus, MessageType, Payload,
};
pub use service::{BackendStats, InMemoryQueueBackend, QueueBackend};
