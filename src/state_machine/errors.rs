use thiserror::Error;

/// Errors raised when a workflow or step transition is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },

    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },
}

impl StateMachineError {
    pub fn guard_failed(reason: impl Into<String>) -> Self {
        Self::GuardFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(from: impl ToString, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            event: event.into(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
