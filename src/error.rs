use thiserror::Error;

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::orchestration::OrchestrationError;
use crate::registry::RegistryError;
use crate::state_machine::StateMachineError;

/// Crate-wide error wrapping each module's error type
#[derive(Debug, Error)]
pub enum FabflowError {
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("State transition error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, FabflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_errors_convert() {
        let err: FabflowError = MessagingError::message_not_found("m-1").into();
        assert!(matches!(err, FabflowError::Messaging(_)));
        assert!(err.to_string().starts_with("Messaging error"));

        let err: FabflowError = OrchestrationError::workflow_not_found("wf-1").into();
        assert!(err.to_string().contains("wf-1"));
    }
}
