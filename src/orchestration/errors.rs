use std::path::PathBuf;

use thiserror::Error;

use crate::messaging::MessagingError;
use crate::state_machine::{StateMachineError, WorkflowState};

/// Orchestration errors
///
/// Step-level transient errors are absorbed by the retry loop; only the final
/// error of a step reaches the workflow record.
#[derive(Debug, Error, Clone)]
pub enum OrchestrationError {
    #[error("Too many active workflows: {active}/{limit}")]
    TooManyWorkflows { active: usize, limit: usize },

    #[error("Workflow not found: {workflow_id}")]
    WorkflowNotFound { workflow_id: String },

    #[error("Workflow {workflow_id} cannot be executed from state {state}")]
    WorkflowNotExecutable {
        workflow_id: String,
        state: WorkflowState,
    },

    #[error("Workflow {workflow_id} is still active ({state})")]
    WorkflowStillActive {
        workflow_id: String,
        state: WorkflowState,
    },

    #[error("Workflow {workflow_id} was cancelled")]
    WorkflowCancelled { workflow_id: String },

    #[error("Capability '{capability}' is not registered")]
    CapabilityNotRegistered { capability: String },

    #[error("No response from '{capability}' for step {step_id} within {timeout_ms}ms")]
    ResponseTimeout {
        capability: String,
        step_id: String,
        timeout_ms: u64,
    },

    #[error("Step '{step_name}' failed: {error}")]
    StepFailed { step_name: String, error: String },

    #[error("Response channel for '{capability}' step {step_id} closed before a reply arrived")]
    ResponseChannelClosed { capability: String, step_id: String },

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Cleanup of {path} failed: {reason}")]
    Cleanup { path: PathBuf, reason: String },
}

impl OrchestrationError {
    pub fn workflow_not_found(workflow_id: impl Into<String>) -> Self {
        Self::WorkflowNotFound {
            workflow_id: workflow_id.into(),
        }
    }

    pub fn capability_not_registered(capability: impl Into<String>) -> Self {
        Self::CapabilityNotRegistered {
            capability: capability.into(),
        }
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::StepFailed {
            step_name: step_name.into(),
            error: error.into(),
        }
    }

    /// Whether a step attempt that hit this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ResponseTimeout { .. }
            | Self::StepFailed { .. }
            | Self::ResponseChannelClosed { .. } => true,
            Self::Messaging(err) => !err.is_capacity_error(),
            _ => false,
        }
    }

    /// Message recorded on the step and workflow
    pub fn step_error_message(&self) -> String {
        match self {
            Self::StepFailed { error, .. } => error.clone(),
            other => other.to_string(),
        }
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(OrchestrationError::ResponseTimeout {
            capability: "cad_agent".into(),
            step_id: "s1".into(),
            timeout_ms: 10,
        }
        .is_retryable());
        assert!(OrchestrationError::step_failed("Slicing", "bad mesh").is_retryable());
        assert!(OrchestrationError::Messaging(MessagingError::internal("boom")).is_retryable());

        assert!(!OrchestrationError::capability_not_registered("printer_agent").is_retryable());
        assert!(!OrchestrationError::Messaging(MessagingError::queue_full(5, 5)).is_retryable());
        assert!(!OrchestrationError::StateMachine(StateMachineError::guard_failed("x"))
            .is_retryable());
    }

    #[test]
    fn test_step_error_message_is_raw_capability_error() {
        let err = OrchestrationError::step_failed("Printing", "nozzle clogged");
        assert_eq!(err.step_error_message(), "nozzle clogged");
        assert_eq!(err.to_string(), "Step 'Printing' failed: nozzle clogged");
    }
}
