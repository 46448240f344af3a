//! Snapshot and report types handed to callers and progress observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messaging::Payload;
use crate::models::{Workflow, WorkflowStep};
use crate::state_machine::{StepState, WorkflowState};

/// Payload delivered to progress callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub workflow_id: String,
    pub state: WorkflowState,
    pub percentage: f64,
    /// True once the workflow reached a terminal state
    pub completed: bool,
}

impl ProgressUpdate {
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.workflow_id.clone(),
            state: workflow.state,
            percentage: workflow.progress_percentage,
            completed: workflow.is_terminal(),
        }
    }
}

/// Per-step status and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step_id: String,
    pub name: String,
    pub agent_type: String,
    pub status: StepState,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl From<&WorkflowStep> for StepReport {
    fn from(step: &WorkflowStep) -> Self {
        Self {
            step_id: step.step_id.clone(),
            name: step.name.clone(),
            agent_type: step.agent_type.clone(),
            status: step.status,
            start_time: step.start_time,
            end_time: step.end_time,
            duration_ms: step.duration_ms(),
            retry_count: step.retry_count,
            error_message: step.error_message.clone(),
        }
    }
}

/// Outcome of `execute_workflow`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub success: bool,
    pub state: WorkflowState,
    pub progress_percentage: f64,
    pub error_message: Option<String>,
    pub steps: Vec<StepReport>,
    /// Output of the printing step once the workflow completed
    pub final_output: Option<Payload>,
    pub duration_ms: Option<i64>,
}

impl From<&Workflow> for WorkflowResult {
    fn from(workflow: &Workflow) -> Self {
        let final_output = if workflow.state == WorkflowState::Completed {
            workflow.steps.last().and_then(|s| s.output_data.clone())
        } else {
            None
        };
        let duration_ms = workflow
            .completed_at
            .map(|end| (end - workflow.created_at).num_milliseconds());

        Self {
            workflow_id: workflow.workflow_id.clone(),
            success: workflow.state == WorkflowState::Completed,
            state: workflow.state,
            progress_percentage: workflow.progress_percentage,
            error_message: workflow.error_message.clone(),
            steps: workflow.steps.iter().map(StepReport::from).collect(),
            final_output,
            duration_ms,
        }
    }
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatusReport {
    pub workflow_id: String,
    pub user_request: String,
    pub state: WorkflowState,
    pub progress_percentage: f64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

impl From<&Workflow> for WorkflowStatusReport {
    fn from(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.workflow_id.clone(),
            user_request: workflow.user_request.clone(),
            state: workflow.state,
            progress_percentage: workflow.progress_percentage,
            error_message: workflow.error_message.clone(),
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
            completed_at: workflow.completed_at,
            steps: workflow.steps.iter().map(StepReport::from).collect(),
        }
    }
}

/// One line of `list_workflows`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub user_request: String,
    pub state: WorkflowState,
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.workflow_id.clone(),
            user_request: workflow.user_request.clone(),
            state: workflow.state,
            progress_percentage: workflow.progress_percentage,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_reports_serialize_with_snake_case_states() {
        let workflow = Workflow::new("bracket", &PipelineConfig::default(), 3);
        let report = WorkflowStatusReport::from(&workflow);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["state"], "pending");
        assert_eq!(json["steps"].as_array().unwrap().len(), 4);
        assert_eq!(json["steps"][0]["status"], "pending");
    }

    #[test]
    fn test_result_of_unfinished_workflow() {
        let workflow = Workflow::new("bracket", &PipelineConfig::default(), 3);
        let result = WorkflowResult::from(&workflow);
        assert!(!result.success);
        assert_eq!(result.final_output, None);
        assert_eq!(result.duration_ms, None);

        let update = ProgressUpdate::from_workflow(&workflow);
        assert!(!update.completed);
        assert_eq!(update.percentage, 0.0);
    }
}
