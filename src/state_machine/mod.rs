// State machines for workflows and their steps
//
// Transitions are pure match tables plus guard checks; the orchestrator applies
// them to workflows it holds under its own lock.

pub mod errors;
pub mod events;
pub mod states;
pub mod step_state_machine;
pub mod workflow_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{StepEvent, WorkflowEvent};
pub use states::{StepState, WorkflowState};
pub use step_state_machine::StepStateMachine;
pub use workflow_state_machine::WorkflowStateMachine;
