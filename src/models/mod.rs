//! # Data Models
//!
//! In-memory workflow records owned by the orchestrator. Callers only ever see
//! cloned snapshots.

pub mod pipeline_stage;
pub mod workflow;
pub mod workflow_step;

pub use pipeline_stage::PipelineStage;
pub use workflow::Workflow;
pub use workflow_step::WorkflowStep;
