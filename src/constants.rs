//! # System Constants
//!
//! Event names, payload keys and system messages shared across the
//! orchestration core.

/// Lifecycle events published on the [`EventPublisher`](crate::events::EventPublisher)
pub mod events {
    // Workflow lifecycle events
    pub const WORKFLOW_CREATED: &str = "workflow.created";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";

    // Step lifecycle events
    pub const STEP_STARTED: &str = "step.started";
    pub const STEP_COMPLETED: &str = "step.completed";
    pub const STEP_RETRY_SCHEDULED: &str = "step.retry_scheduled";
    pub const STEP_FAILED: &str = "step.failed";
}

/// Keys used inside message payloads
pub mod payload_keys {
    /// Free-form request seeding the first step
    pub const USER_REQUEST: &str = "user_request";
    pub const WORKFLOW_ID: &str = "workflow_id";
    /// Paths of files a capability produced, recorded for rollback
    pub const ARTIFACTS: &str = "artifacts";
}

pub mod system {
    /// Reason recorded on a step failed by cancellation
    pub const CANCELLATION_MESSAGE: &str = "Workflow cancelled by user";

    /// Reason recorded when rollback cancels a still-active workflow
    pub const ROLLBACK_CANCELLATION_MESSAGE: &str = "Workflow cancelled during rollback";
}
