use chrono::Utc;
use tracing::{debug, warn};

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::{StepEvent, WorkflowEvent},
    states::{StepState, WorkflowState},
    step_state_machine::StepStateMachine,
};
use crate::models::Workflow;

/// Workflow state machine
///
/// `PENDING → RESEARCH_PHASE → CAD_PHASE → SLICING_PHASE → PRINTING_PHASE → COMPLETED`,
/// with `FAILED` and `CANCELLED` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowStateMachine;

impl WorkflowStateMachine {
    /// Check guards, apply an event and run its actions
    pub fn transition(
        workflow: &mut Workflow,
        event: WorkflowEvent,
    ) -> StateMachineResult<WorkflowState> {
        let current_state = workflow.state;
        let target_state = Self::determine_target_state(current_state, &event)?;

        Self::check_guards(workflow, &event)?;
        Self::execute_actions(workflow, target_state, event);

        debug!(
            workflow_id = %workflow.workflow_id,
            from_state = %current_state,
            to_state = %target_state,
            "Workflow transition applied"
        );

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: WorkflowState,
        event: &WorkflowEvent,
    ) -> StateMachineResult<WorkflowState> {
        let target = match (current_state, event) {
            (WorkflowState::Pending, WorkflowEvent::EnterPhase(stage)) => stage.phase(),
            (from, WorkflowEvent::EnterPhase(stage))
                if from.phase_index().is_some_and(|i| stage.index() > i) =>
            {
                stage.phase()
            }

            (from, WorkflowEvent::Complete) if from.is_active() => WorkflowState::Completed,

            (from, WorkflowEvent::Fail(_)) if !from.is_terminal() => WorkflowState::Failed,
            (from, WorkflowEvent::Cancel(_)) if !from.is_terminal() => WorkflowState::Cancelled,

            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }

    fn check_guards(workflow: &Workflow, event: &WorkflowEvent) -> StateMachineResult<()> {
        match event {
            // Earlier stages must be done before a later phase starts
            WorkflowEvent::EnterPhase(stage) => {
                if workflow.step_for(*stage).is_none() {
                    return Err(StateMachineError::guard_failed(format!(
                        "workflow has no {stage} step"
                    )));
                }
                let blocked = workflow
                    .steps
                    .iter()
                    .filter(|s| s.stage < *stage)
                    .find(|s| !matches!(s.status, StepState::Completed | StepState::Skipped));
                if let Some(step) = blocked {
                    return Err(StateMachineError::guard_failed(format!(
                        "step '{}' is {} before {stage} phase",
                        step.name, step.status
                    )));
                }
            }
            WorkflowEvent::Complete => {
                if let Some(step) = workflow
                    .steps
                    .iter()
                    .find(|s| !matches!(s.status, StepState::Completed | StepState::Skipped))
                {
                    return Err(StateMachineError::guard_failed(format!(
                        "step '{}' is still {}",
                        step.name, step.status
                    )));
                }
            }
            WorkflowEvent::Fail(_) | WorkflowEvent::Cancel(_) => {}
        }

        Ok(())
    }

    fn execute_actions(workflow: &mut Workflow, target_state: WorkflowState, event: WorkflowEvent) {
        let now = Utc::now();

        match event {
            WorkflowEvent::EnterPhase(_) => {}
            WorkflowEvent::Complete => {
                workflow.completed_at = Some(now);
            }
            WorkflowEvent::Fail(error) => {
                workflow.error_message = Some(error);
                workflow.completed_at = Some(now);
            }
            WorkflowEvent::Cancel(reason) => {
                for step in workflow
                    .steps
                    .iter_mut()
                    .filter(|s| s.status == StepState::Running)
                {
                    if let Err(e) =
                        StepStateMachine::transition(step, StepEvent::Fail(reason.clone()))
                    {
                        warn!(step_id = %step.step_id, error = %e, "Could not fail running step on cancel");
                    }
                }
                workflow.error_message = Some(reason);
                workflow.completed_at = Some(now);
            }
        }

        workflow.state = target_state;
        workflow.recompute_progress();
        workflow.updated_at = now;
    }
}
