use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PipelineStage;
use crate::messaging::Payload;
use crate::state_machine::StepState;

/// One pipeline stage instance within a workflow
///
/// Status changes go through [`StepStateMachine`](crate::state_machine::StepStateMachine);
/// the orchestrator owns the retry counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: String,
    pub name: String,
    pub stage: PipelineStage,
    /// Capability the step's requests are routed to
    pub agent_type: String,
    pub status: StepState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub input_data: Payload,
    pub output_data: Option<Payload>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl WorkflowStep {
    pub fn new(stage: PipelineStage, agent_type: impl Into<String>, max_retries: u32) -> Self {
        Self {
            step_id: Uuid::new_v4().to_string(),
            name: stage.step_name().to_string(),
            stage,
            agent_type: agent_type.into(),
            status: StepState::Pending,
            start_time: None,
            end_time: None,
            input_data: Payload::new(),
            output_data: None,
            error_message: None,
            retry_count: 0,
            max_retries,
        }
    }

    /// True while the step has not completed and has retry budget left
    pub fn can_retry(&self) -> bool {
        self.status != StepState::Completed && self.retry_count < self.max_retries
    }

    /// Wall-clock duration once both timestamps are known
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepState::Completed
    }
}
