use serde::{Deserialize, Serialize};

use crate::messaging::Payload;
use crate::models::PipelineStage;

/// Events that can trigger workflow state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WorkflowEvent {
    /// Begin executing the given stage
    EnterPhase(PipelineStage),
    /// All steps finished successfully
    Complete,
    /// Halt with the failing step's error
    Fail(String),
    /// External cancellation
    Cancel(String),
}

impl WorkflowEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EnterPhase(_) => "enter_phase",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel(_) => "cancel",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) | Self::Cancel(msg) => Some(msg),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::EnterPhase(_))
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    pub fn cancel_with_reason(reason: impl Into<String>) -> Self {
        Self::Cancel(reason.into())
    }
}

/// Events that can trigger workflow step state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepEvent {
    /// Start processing the step with its input
    Start(Payload),
    /// Mark step as complete with the capability's output
    Complete(Payload),
    /// Mark step as failed with error message
    Fail(String),
    /// Skip a step that will never run
    Skip,
}

impl StepEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Skip => "skip",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Start(_))
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
