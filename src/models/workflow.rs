use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PipelineStage, WorkflowStep};
use crate::config::PipelineConfig;
use crate::state_machine::{StepState, WorkflowState};

/// One end-to-end pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub user_request: String,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<WorkflowStep>,
    pub progress_percentage: f64,
    pub error_message: Option<String>,
}

impl Workflow {
    /// Build a workflow with one pending step per pipeline stage
    pub fn new(
        user_request: impl Into<String>,
        pipeline: &PipelineConfig,
        step_max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        let steps = PipelineStage::ALL
            .iter()
            .map(|stage| WorkflowStep::new(*stage, pipeline.capability_for(*stage), step_max_retries))
            .collect();

        Self {
            workflow_id: Uuid::new_v4().to_string(),
            user_request: user_request.into(),
            state: WorkflowState::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            steps,
            progress_percentage: 0.0,
            error_message: None,
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    /// `100 × completed / total`, zero for an empty workflow
    pub fn calculate_progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        100.0 * self.completed_steps() as f64 / self.steps.len() as f64
    }

    pub fn recompute_progress(&mut self) {
        self.progress_percentage = self.calculate_progress();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn step_for(&self, stage: PipelineStage) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.stage == stage)
    }

    /// The step currently waiting on its capability, if any
    pub fn running_step(&self) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.status == StepState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workflow_has_fixed_pipeline() {
        let workflow = Workflow::new("print a bracket", &PipelineConfig::default(), 3);

        assert_eq!(workflow.state, WorkflowState::Pending);
        assert_eq!(workflow.steps.len(), 4);
        let agents: Vec<&str> = workflow.steps.iter().map(|s| s.agent_type.as_str()).collect();
        assert_eq!(
            agents,
            vec!["research_agent", "cad_agent", "slicer_agent", "printer_agent"]
        );
        assert!(workflow.steps.iter().all(|s| s.status == StepState::Pending));
        assert!(workflow.steps.iter().all(|s| s.max_retries == 3));
        assert_eq!(workflow.progress_percentage, 0.0);
    }

    #[test]
    fn test_progress_is_completed_fraction() {
        let mut workflow = Workflow::new("gear", &PipelineConfig::default(), 3);
        workflow.steps[0].status = StepState::Completed;
        workflow.recompute_progress();
        assert_eq!(workflow.progress_percentage, 25.0);

        workflow.steps[1].status = StepState::Completed;
        workflow.steps[2].status = StepState::Failed;
        workflow.recompute_progress();
        assert_eq!(workflow.progress_percentage, 50.0);
    }

    #[test]
    fn test_step_lookup() {
        let workflow = Workflow::new("gear", &PipelineConfig::default(), 3);
        let cad = workflow.step_for(PipelineStage::Cad).unwrap();
        assert_eq!(cad.agent_type, "cad_agent");
        assert!(workflow.running_step().is_none());
    }
}
