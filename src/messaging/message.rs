//! # Queue Message Structures
//!
//! Defines the unit of work that travels between the orchestrator and pipeline
//! capabilities. A message is immutable by convention: only queue operations
//! (put, get, ack, nack) move its status or retry counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{MessagingError, MessagingResult};

/// Structured key-value payload carried by a message
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Message priority levels
///
/// Lower discriminant is served first: `Critical` preempts everything,
/// `Background` only runs when nothing else is pending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Critical = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Background = 4,
}

impl MessagePriority {
    /// All priority classes in service order
    pub const ALL: [MessagePriority; 5] = [
        Self::Critical,
        Self::High,
        Self::Normal,
        Self::Low,
        Self::Background,
    ];
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
    Retrying,
}

impl MessageStatus {
    /// Check if the message has left the queue for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
            Self::Retrying => write!(f, "retrying"),
        }
    }
}

/// Kind of message travelling through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Request,
    Response,
    Status,
}

/// Unit of inter-capability work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Capability that produced the message
    pub sender: String,
    /// Capability that should process the message
    pub receiver: String,
    pub message_type: MessageType,
    pub payload: Payload,
    pub priority: MessagePriority,
    /// Creation time, the FIFO tie-break inside a priority class
    pub created_at: DateTime<Utc>,
    /// Absolute delivery deadline
    pub expires_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: MessageStatus,
    /// Originating step id, used to route the response back
    pub correlation_id: Option<String>,
    /// Id of the request this message answers
    pub in_reply_to: Option<String>,
}

impl Message {
    /// Create a new message with a generated id and default settings
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        message_type: MessageType,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            receiver: receiver.into(),
            message_type,
            payload,
            priority: MessagePriority::default(),
            created_at: Utc::now(),
            expires_at: None,
            retry_count: 0,
            max_retries: 3,
            status: MessageStatus::Pending,
            correlation_id: None,
            in_reply_to: None,
        }
    }

    /// Create a request message
    pub fn request(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self::new(sender, receiver, MessageType::Request, payload)
    }

    /// Build the response to this request, addressed back to its sender
    pub fn reply(&self, payload: Payload) -> Self {
        let mut response = Self::new(
            self.receiver.clone(),
            self.sender.clone(),
            MessageType::Response,
            payload,
        );
        response.priority = self.priority;
        response.correlation_id = self.correlation_id.clone();
        response.in_reply_to = Some(self.id.clone());
        response
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expire the message `ttl` after its creation time
    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.expires_at = self.created_at.checked_add_signed(ttl);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Check if the message is past its deadline at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }

    /// Check if the message is past its deadline
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if one more delivery attempt is allowed after a failure
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Get message age in milliseconds
    pub fn age_ms(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.created_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Convert to JSON
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Create from JSON
    pub fn from_json(json: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }
}

/// Outcome reported by a capability for one request
///
/// On the wire this is `{"success": true, "data": {...}}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityResponse {
    Success { data: Payload },
    Failure { error: String },
}

impl CapabilityResponse {
    pub fn success(data: Payload) -> Self {
        Self::Success { data }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Encode as a response payload
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        match self {
            Self::Success { data } => {
                payload.insert("success".to_string(), true.into());
                payload.insert("data".to_string(), data.clone().into());
            }
            Self::Failure { error } => {
                payload.insert("success".to_string(), false.into());
                payload.insert("error".to_string(), error.clone().into());
            }
        }
        payload
    }

    /// Decode a response payload
    pub fn from_payload(payload: &Payload) -> MessagingResult<Self> {
        let success = payload
            .get("success")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| MessagingError::malformed_payload("missing boolean 'success' field"))?;

        if success {
            let data = match payload.get("data") {
                Some(serde_json::Value::Object(map)) => map.clone(),
                Some(serde_json::Value::Null) | None => Payload::new(),
                Some(_) => {
                    return Err(MessagingError::malformed_payload(
                        "'data' must be an object",
                    ))
                }
            };
            Ok(Self::Success { data })
        } else {
            let error = payload
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("capability reported failure without an error message")
                .to_string();
            Ok(Self::Failure { error })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_message_creation() {
        let message = Message::request("orchestrator", "cad_agent", payload(json!({"x": 1})));

        assert_eq!(message.sender, "orchestrator");
        assert_eq!(message.receiver, "cad_agent");
        assert_eq!(message.message_type, MessageType::Request);
        assert_eq!(message.priority, MessagePriority::Normal);
        assert_eq!(message.status, MessageStatus::Pending);
        assert_eq!(message.retry_count, 0);
        assert_eq!(message.max_retries, 3);
        assert!(!message.is_expired());
        assert!(message.can_retry());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MessagePriority::Critical < MessagePriority::High);
        assert!(MessagePriority::High < MessagePriority::Normal);
        assert!(MessagePriority::Normal < MessagePriority::Low);
        assert!(MessagePriority::Low < MessagePriority::Background);
        assert_eq!(MessagePriority::ALL.len(), 5);
    }

    #[test]
    fn test_expiration() {
        let past = Utc::now() - chrono::Duration::seconds(5);
        let message =
            Message::request("a", "b", Payload::new()).with_expires_at(past);
        assert!(message.is_expired());

        let fresh = Message::request("a", "b", Payload::new())
            .with_ttl(std::time::Duration::from_secs(60));
        assert!(!fresh.is_expired());
    }

    #[test]
    fn test_reply_carries_correlation() {
        let request = Message::request("orchestrator", "slicer_agent", Payload::new())
            .with_priority(MessagePriority::High)
            .with_correlation_id("step-1");
        let response = request.reply(CapabilityResponse::success(Payload::new()).to_payload());

        assert_eq!(response.sender, "slicer_agent");
        assert_eq!(response.receiver, "orchestrator");
        assert_eq!(response.message_type, MessageType::Response);
        assert_eq!(response.correlation_id.as_deref(), Some("step-1"));
        assert_eq!(response.in_reply_to.as_deref(), Some(request.id.as_str()));
        assert_eq!(response.priority, MessagePriority::High);
    }

    #[test]
    fn test_capability_response_payloads() {
        let success = CapabilityResponse::success(payload(json!({"mesh": "part.stl"})));
        let decoded = CapabilityResponse::from_payload(&success.to_payload()).unwrap();
        assert_eq!(decoded, success);

        let failure = CapabilityResponse::from_payload(&payload(
            json!({"success": false, "error": "printer offline"}),
        ))
        .unwrap();
        assert_eq!(failure, CapabilityResponse::failure("printer offline"));

        let missing_data =
            CapabilityResponse::from_payload(&payload(json!({"success": true}))).unwrap();
        assert_eq!(missing_data, CapabilityResponse::success(Payload::new()));
    }

    #[test]
    fn test_malformed_response_payload() {
        assert!(CapabilityResponse::from_payload(&payload(json!({"data": {}}))).is_err());
        assert!(
            CapabilityResponse::from_payload(&payload(json!({"success": true, "data": 3})))
                .is_err()
        );
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&MessageStatus::Retrying).unwrap();
        assert_eq!(json, "\"retrying\"");
        assert!(MessageStatus::Expired.is_terminal());
        assert!(!MessageStatus::Retrying.is_terminal());
    }
}
