use chrono::Utc;
use tracing::debug;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::StepEvent,
    states::StepState,
};
use crate::models::WorkflowStep;

/// Workflow step state machine
///
/// `PENDING → RUNNING → {COMPLETED | FAILED}`, plus `PENDING → {SKIPPED | FAILED}`.
/// A step stays RUNNING across retry attempts, so `start_time` marks the first attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStateMachine;

impl StepStateMachine {
    /// Apply an event to a step, stamping timestamps and data
    pub fn transition(step: &mut WorkflowStep, event: StepEvent) -> StateMachineResult<StepState> {
        let current_state = step.status;
        let target_state = Self::determine_target_state(current_state, &event)?;
        let now = Utc::now();

        match event {
            StepEvent::Start(input) => {
                step.input_data = input;
                step.start_time.get_or_insert(now);
                step.error_message = None;
            }
            StepEvent::Complete(output) => {
                step.output_data = Some(output);
                step.error_message = None;
                step.end_time = Some(now);
            }
            StepEvent::Fail(error) => {
                step.error_message = Some(error);
                step.end_time = Some(now);
            }
            StepEvent::Skip => {
                step.end_time = Some(now);
            }
        }
        step.status = target_state;

        debug!(
            step_id = %step.step_id,
            stage = %step.stage,
            from_state = %current_state,
            to_state = %target_state,
            "Step transition applied"
        );

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: StepState,
        event: &StepEvent,
    ) -> StateMachineResult<StepState> {
        let target = match (current_state, event) {
            (StepState::Pending, StepEvent::Start(_)) => StepState::Running,
            (StepState::Running, StepEvent::Complete(_)) => StepState::Completed,
            (StepState::Running | StepState::Pending, StepEvent::Fail(_)) => StepState::Failed,
            (StepState::Pending, StepEvent::Skip) => StepState::Skipped,

            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }
}
