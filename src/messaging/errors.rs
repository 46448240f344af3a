//! # Messaging Error Types
//!
//! Structured error types for queue operations using thiserror.

use thiserror::Error;

/// Messaging error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MessagingError {
    #[error("Queue capacity exceeded: {current_count} messages, limit is {limit_count}")]
    QueueFull {
        current_count: usize,
        limit_count: usize,
    },

    #[error("Duplicate message: {message_id} is already pending or in flight")]
    DuplicateMessage { message_id: String },

    #[error("Message not found in flight: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Malformed message payload: {message}")]
    MalformedPayload { message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Internal messaging error: {message}")]
    Internal { message: String },
}

impl MessagingError {
    /// Create a queue full error
    pub fn queue_full(current_count: usize, limit_count: usize) -> Self {
        Self::QueueFull {
            current_count,
            limit_count,
        }
    }

    /// Create a duplicate message error
    pub fn duplicate_message(message_id: impl Into<String>) -> Self {
        Self::DuplicateMessage {
            message_id: message_id.into(),
        }
    }

    /// Create a message not found error
    pub fn message_not_found(message_id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            message_id: message_id.into(),
        }
    }

    /// Create a malformed payload error
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Capacity errors are rejected outright and never retried by the queue
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::MessageSerialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for messaging operations
pub type MessagingResult<T> = Result<T, MessagingError>;
