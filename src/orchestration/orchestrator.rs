//! # Workflow Orchestrator
//!
//! Drives each workflow through the fixed pipeline. For every step it sends a
//! HIGH priority request to the step's capability, waits for the correlated
//! response, and retries with exponential backoff until the step's budget runs
//! out. A step that fails for good fails the workflow and triggers rollback of
//! recorded artifacts.
//!
//! ## Concurrency
//!
//! Workflows live in a `DashMap` of `Arc<Mutex<Workflow>>`. Locks are held only
//! for short synchronous updates and never across an await; progress callbacks
//! and event publishing happen after the lock is released. Steps within one
//! workflow are strictly sequential while distinct workflows progress
//! independently.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fabflow_core::config::FabflowConfig;
//! use fabflow_core::messaging::MessageQueue;
//! use fabflow_core::orchestration::WorkflowOrchestrator;
//! use fabflow_core::registry::CapabilityRegistry;
//!
//! # async fn example(registry: CapabilityRegistry) -> fabflow_core::Result<()> {
//! let config = FabflowConfig::default();
//! let queue = Arc::new(MessageQueue::from_config(&config.queue));
//! let orchestrator = Arc::new(WorkflowOrchestrator::new(&config, queue, registry));
//!
//! let workflow_id = orchestrator.create_workflow("a 40mm phone stand", None)?;
//! let result = orchestrator.execute_workflow(&workflow_id).await?;
//! println!("{} finished as {}", result.workflow_id, result.state);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffCalculator;
use super::cleanup::{CleanupRegistry, CleanupReport};
use super::errors::{OrchestrationError, OrchestrationResult};
use super::progress::{ProgressCallback, ProgressNotifier};
use super::response_table::ResponseTable;
use super::types::{ProgressUpdate, WorkflowResult, WorkflowStatusReport, WorkflowSummary};
use crate::config::{FabflowConfig, OrchestrationConfig, PipelineConfig};
use crate::constants::{events, payload_keys, system};
use crate::events::EventPublisher;
use crate::logging::{log_error, log_step_operation, log_workflow_operation};
use crate::messaging::{CapabilityResponse, Message, MessagePriority, MessageQueue, Payload};
use crate::models::{PipelineStage, Workflow};
use crate::registry::CapabilityRegistry;
use crate::state_machine::{
    StepEvent, StepStateMachine, WorkflowEvent, WorkflowState, WorkflowStateMachine,
};

type WorkflowHandle = Arc<Mutex<Workflow>>;

/// What a running step needs to know between attempts
#[derive(Debug, Clone)]
struct StepTarget {
    index: usize,
    step_id: String,
    name: String,
    stage: PipelineStage,
    capability: String,
}

/// Owns every active workflow and drives their execution
pub struct WorkflowOrchestrator {
    config: OrchestrationConfig,
    pipeline: PipelineConfig,
    message_max_retries: u32,
    queue: Arc<MessageQueue>,
    registry: CapabilityRegistry,
    responses: Arc<ResponseTable>,
    backoff: BackoffCalculator,
    cleanup: CleanupRegistry,
    progress: ProgressNotifier,
    events: EventPublisher,
    workflows: DashMap<String, WorkflowHandle>,
    /// Serializes the capacity check with the insert in `create_workflow`
    admission: Mutex<()>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("workflows", &self.workflows.len())
            .field("max_concurrent_workflows", &self.config.max_concurrent_workflows)
            .finish()
    }
}

impl WorkflowOrchestrator {
    pub fn new(config: &FabflowConfig, queue: Arc<MessageQueue>, registry: CapabilityRegistry) -> Self {
        Self {
            config: config.orchestration.clone(),
            pipeline: config.pipeline.clone(),
            message_max_retries: config.queue.default_max_retries,
            queue,
            registry,
            responses: Arc::new(ResponseTable::new()),
            backoff: BackoffCalculator::new(config.backoff.clone()),
            cleanup: CleanupRegistry::new(),
            progress: ProgressNotifier::new(),
            events: EventPublisher::new(config.orchestration.event_buffer_size),
            workflows: DashMap::new(),
            admission: Mutex::new(()),
        }
    }

    /// Table the capability dispatcher delivers responses into
    pub fn response_table(&self) -> Arc<ResponseTable> {
        Arc::clone(&self.responses)
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.events
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Create a workflow with one pending step per pipeline stage
    pub fn create_workflow(
        &self,
        user_request: impl Into<String>,
        progress_callback: Option<ProgressCallback>,
    ) -> OrchestrationResult<String> {
        let workflow = {
            let _admission = self.admission.lock();
            let active = self.active_workflow_count();
            if active >= self.config.max_concurrent_workflows {
                warn!(
                    active = active,
                    limit = self.config.max_concurrent_workflows,
                    "Workflow rejected: concurrency limit reached"
                );
                return Err(OrchestrationError::TooManyWorkflows {
                    active,
                    limit: self.config.max_concurrent_workflows,
                });
            }

            let workflow = Workflow::new(user_request, &self.pipeline, self.config.step_max_retries);
            self.workflows.insert(
                workflow.workflow_id.clone(),
                Arc::new(Mutex::new(workflow.clone())),
            );
            workflow
        };

        if let Some(callback) = progress_callback {
            self.progress.register(&workflow.workflow_id, callback);
        }

        log_workflow_operation(
            "create",
            &workflow.workflow_id,
            workflow.state.as_str(),
            Some(&format!("{} steps", workflow.steps.len())),
        );
        self.events.publish(
            events::WORKFLOW_CREATED,
            json!({
                "workflow_id": workflow.workflow_id,
                "user_request": workflow.user_request,
                "steps": workflow.steps.iter().map(|s| s.agent_type.clone()).collect::<Vec<_>>(),
            }),
        );

        Ok(workflow.workflow_id)
    }

    /// Run every step of a pending workflow in order
    ///
    /// Returns the final result whether the workflow completed, failed or was
    /// cancelled; errors are reserved for unknown or non-pending workflows.
    pub async fn execute_workflow(&self, workflow_id: &str) -> OrchestrationResult<WorkflowResult> {
        let handle = self.handle(workflow_id)?;

        let seed = {
            let workflow = handle.lock();
            if workflow.state != WorkflowState::Pending {
                return Err(OrchestrationError::WorkflowNotExecutable {
                    workflow_id: workflow_id.to_string(),
                    state: workflow.state,
                });
            }
            let mut seed = Payload::new();
            seed.insert(
                payload_keys::USER_REQUEST.to_string(),
                Value::String(workflow.user_request.clone()),
            );
            seed.insert(
                payload_keys::WORKFLOW_ID.to_string(),
                Value::String(workflow.workflow_id.clone()),
            );
            seed
        };

        log_workflow_operation("execute", workflow_id, "pending", None);
        self.events
            .publish(events::WORKFLOW_STARTED, json!({ "workflow_id": workflow_id }));

        if let Err(e) = self.drive_steps(&handle, workflow_id, seed).await {
            log_error(
                "orchestrator",
                "execute_workflow",
                &e.to_string(),
                Some(workflow_id),
            );
            self.rollback(&handle, workflow_id).await;
        }

        Ok(self.finish(&handle, workflow_id).await)
    }

    /// Run `execute_workflow` on a background task
    pub fn spawn_workflow(
        self: &Arc<Self>,
        workflow_id: &str,
    ) -> JoinHandle<OrchestrationResult<WorkflowResult>> {
        let orchestrator = Arc::clone(self);
        let workflow_id = workflow_id.to_string();
        tokio::spawn(async move { orchestrator.execute_workflow(&workflow_id).await })
    }

    /// Snapshot of one workflow's state and steps
    pub fn get_workflow_status(&self, workflow_id: &str) -> OrchestrationResult<WorkflowStatusReport> {
        let handle = self.handle(workflow_id)?;
        let workflow = handle.lock();
        Ok(WorkflowStatusReport::from(&*workflow))
    }

    /// Cloned workflow record
    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.workflows
            .get(workflow_id)
            .map(|entry| entry.value().lock().clone())
    }

    /// Cancel a non-terminal workflow
    ///
    /// The running step is failed with a cancellation message; an in-flight
    /// response wait is not interrupted, the step loop stops at its next check.
    pub fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let Ok(handle) = self.handle(workflow_id) else {
            return false;
        };

        let update = {
            let mut workflow = handle.lock();
            if workflow.is_terminal() {
                return false;
            }
            if let Some(step) = workflow.running_step() {
                info!(
                    workflow_id = workflow_id,
                    step_id = %step.step_id,
                    capability = %step.agent_type,
                    retry_count = step.retry_count,
                    "🛑 Cancelling workflow with a running step"
                );
            }
            if let Err(e) = WorkflowStateMachine::transition(
                &mut workflow,
                WorkflowEvent::cancel_with_reason(system::CANCELLATION_MESSAGE),
            ) {
                warn!(workflow_id = workflow_id, error = %e, "Cancel rejected");
                return false;
            }
            ProgressUpdate::from_workflow(&workflow)
        };

        log_workflow_operation("cancel", workflow_id, update.state.as_str(), None);
        self.events.publish(
            events::WORKFLOW_CANCELLED,
            json!({ "workflow_id": workflow_id, "progress_percentage": update.percentage }),
        );
        self.progress.notify(&update);
        true
    }

    /// Summaries of every held workflow, oldest first
    pub fn list_workflows(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<WorkflowSummary> = self
            .workflows
            .iter()
            .map(|entry| WorkflowSummary::from(&*entry.value().lock()))
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    pub fn register_progress_callback(
        &self,
        workflow_id: &str,
        callback: ProgressCallback,
    ) -> OrchestrationResult<()> {
        self.handle(workflow_id)?;
        self.progress.register(workflow_id, callback);
        Ok(())
    }

    /// Record a file or directory to delete if the workflow fails
    pub fn register_artifact(
        &self,
        workflow_id: &str,
        path: impl Into<PathBuf>,
    ) -> OrchestrationResult<()> {
        self.handle(workflow_id)?;
        self.cleanup.record(workflow_id, path);
        Ok(())
    }

    /// Drop a terminal workflow from the active table
    pub fn remove_workflow(&self, workflow_id: &str) -> OrchestrationResult<Workflow> {
        let handle = self.handle(workflow_id)?;
        {
            let workflow = handle.lock();
            if !workflow.is_terminal() {
                return Err(OrchestrationError::WorkflowStillActive {
                    workflow_id: workflow_id.to_string(),
                    state: workflow.state,
                });
            }
        }

        let (_, handle) = self
            .workflows
            .remove(workflow_id)
            .ok_or_else(|| OrchestrationError::workflow_not_found(workflow_id))?;
        self.progress.remove(workflow_id);
        self.cleanup.discard(workflow_id);
        debug!(workflow_id = workflow_id, "Workflow removed");

        let workflow = handle.lock().clone();
        Ok(workflow)
    }

    /// Non-terminal workflows, the ones counted against the concurrency cap
    pub fn active_workflow_count(&self) -> usize {
        self.workflows
            .iter()
            .filter(|entry| !entry.value().lock().is_terminal())
            .count()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    fn handle(&self, workflow_id: &str) -> OrchestrationResult<WorkflowHandle> {
        self.workflows
            .get(workflow_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| OrchestrationError::workflow_not_found(workflow_id))
    }

    /// Step loop; stops at the first failed step or when the workflow is cancelled
    async fn drive_steps(
        &self,
        handle: &WorkflowHandle,
        workflow_id: &str,
        seed: Payload,
    ) -> OrchestrationResult<()> {
        let step_count = handle.lock().steps.len();
        let mut input = seed;

        for index in 0..step_count {
            let Some((target, update)) = self.begin_step(handle, index, &input)? else {
                return Ok(());
            };
            self.progress.notify(&update);
            log_step_operation(
                "start",
                workflow_id,
                &target.step_id,
                &target.capability,
                None,
            );
            self.events.publish(
                events::STEP_STARTED,
                json!({
                    "workflow_id": workflow_id,
                    "step_id": target.step_id,
                    "step_name": target.name,
                    "capability": target.capability,
                }),
            );

            let outcome = self.run_step(handle, workflow_id, &target, &input).await;

            match outcome {
                Ok(output) => {
                    let Some(update) = self.complete_step(handle, &target, output.clone())? else {
                        return Ok(());
                    };
                    log_step_operation(
                        "complete",
                        workflow_id,
                        &target.step_id,
                        &target.capability,
                        None,
                    );
                    self.events.publish(
                        events::STEP_COMPLETED,
                        json!({
                            "workflow_id": workflow_id,
                            "step_id": target.step_id,
                            "capability": target.capability,
                            "progress_percentage": update.percentage,
                        }),
                    );
                    self.progress.notify(&update);
                    input = output;
                }
                Err(err) => {
                    self.fail_step(handle, workflow_id, &target, &err)?;
                    return Ok(());
                }
            }
        }

        let mut workflow = handle.lock();
        if !workflow.is_terminal() {
            WorkflowStateMachine::transition(&mut workflow, WorkflowEvent::Complete)?;
        }
        Ok(())
    }

    /// Enter the step's phase and mark it RUNNING; `None` if the workflow was cancelled
    fn begin_step(
        &self,
        handle: &WorkflowHandle,
        index: usize,
        input: &Payload,
    ) -> OrchestrationResult<Option<(StepTarget, ProgressUpdate)>> {
        let mut workflow = handle.lock();
        if workflow.is_terminal() {
            return Ok(None);
        }

        let stage = workflow.steps[index].stage;
        WorkflowStateMachine::transition(&mut workflow, WorkflowEvent::EnterPhase(stage))?;
        let step = &mut workflow.steps[index];
        StepStateMachine::transition(step, StepEvent::Start(input.clone()))?;

        let target = StepTarget {
            index,
            step_id: step.step_id.clone(),
            name: step.name.clone(),
            stage,
            capability: step.agent_type.clone(),
        };
        workflow.touch();
        Ok(Some((target, ProgressUpdate::from_workflow(&workflow))))
    }

    /// Attempt loop for one step
    async fn run_step(
        &self,
        handle: &WorkflowHandle,
        workflow_id: &str,
        target: &StepTarget,
        input: &Payload,
    ) -> OrchestrationResult<Payload> {
        loop {
            let err = match self.attempt_step(target, input).await {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            let retry_count = {
                let mut workflow = handle.lock();
                if workflow.is_terminal() {
                    return Err(OrchestrationError::WorkflowCancelled {
                        workflow_id: workflow_id.to_string(),
                    });
                }
                let step = &mut workflow.steps[target.index];
                step.retry_count += 1;
                if !step.can_retry() {
                    return Err(err);
                }
                workflow.touch();
                workflow.steps[target.index].retry_count
            };

            let delay = self.backoff.delay_for_retry(retry_count);
            warn!(
                workflow_id = workflow_id,
                step_id = %target.step_id,
                capability = %target.capability,
                attempt = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "🔁 Step attempt failed, retrying after backoff"
            );
            self.events.publish(
                events::STEP_RETRY_SCHEDULED,
                json!({
                    "workflow_id": workflow_id,
                    "step_id": target.step_id,
                    "retry_count": retry_count,
                    "delay_ms": delay.as_millis() as u64,
                    "error": err.to_string(),
                }),
            );
            tokio::time::sleep(delay).await;

            if handle.lock().is_terminal() {
                debug!(
                    workflow_id = workflow_id,
                    step_id = %target.step_id,
                    "Workflow ended during backoff, skipping next attempt"
                );
                return Err(OrchestrationError::WorkflowCancelled {
                    workflow_id: workflow_id.to_string(),
                });
            }
        }
    }

    /// One request/response round-trip
    async fn attempt_step(
        &self,
        target: &StepTarget,
        input: &Payload,
    ) -> OrchestrationResult<Payload> {
        if !self.registry.contains(&target.capability) {
            return Err(OrchestrationError::capability_not_registered(&target.capability));
        }

        let timeout = self.config.step_response_timeout();
        let request = Message::request(&self.config.sender_name, &target.capability, input.clone())
            .with_priority(MessagePriority::High)
            .with_correlation_id(&target.step_id)
            .with_max_retries(self.message_max_retries)
            .with_ttl(timeout);

        let receiver = self
            .responses
            .register(&target.capability, &target.step_id, &request.id);
        if let Err(e) = self.queue.send(request).await {
            self.responses.cancel(&target.capability, &target.step_id);
            return Err(e.into());
        }

        let response = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(OrchestrationError::ResponseChannelClosed {
                    capability: target.capability.clone(),
                    step_id: target.step_id.clone(),
                })
            }
            Err(_) => {
                self.responses.cancel(&target.capability, &target.step_id);
                return Err(OrchestrationError::ResponseTimeout {
                    capability: target.capability.clone(),
                    step_id: target.step_id.clone(),
                    timeout_ms: self.config.step_response_timeout_ms,
                });
            }
        };

        match CapabilityResponse::from_payload(&response.payload)? {
            CapabilityResponse::Success { data } => Ok(data),
            CapabilityResponse::Failure { error } => {
                Err(OrchestrationError::step_failed(&target.name, error))
            }
        }
    }

    /// Record a successful step; `None` if the workflow was cancelled meanwhile
    fn complete_step(
        &self,
        handle: &WorkflowHandle,
        target: &StepTarget,
        output: Payload,
    ) -> OrchestrationResult<Option<ProgressUpdate>> {
        let mut workflow = handle.lock();
        if workflow.is_terminal() {
            debug!(
                workflow_id = %workflow.workflow_id,
                step_id = %target.step_id,
                "Late step result ignored for terminal workflow"
            );
            return Ok(None);
        }

        let artifacts = artifact_paths(&output);
        let step = &mut workflow.steps[target.index];
        StepStateMachine::transition(step, StepEvent::Complete(output))?;
        for path in artifacts {
            self.cleanup.record(&workflow.workflow_id, path);
        }

        workflow.recompute_progress();
        workflow.touch();
        Ok(Some(ProgressUpdate::from_workflow(&workflow)))
    }

    /// Mark the step and its workflow FAILED
    fn fail_step(
        &self,
        handle: &WorkflowHandle,
        workflow_id: &str,
        target: &StepTarget,
        err: &OrchestrationError,
    ) -> OrchestrationResult<()> {
        let message = err.step_error_message();
        let retry_count = {
            let mut workflow = handle.lock();
            if workflow.is_terminal() {
                return Ok(());
            }
            let step = &mut workflow.steps[target.index];
            StepStateMachine::transition(step, StepEvent::Fail(message.clone()))?;
            let retry_count = step.retry_count;
            WorkflowStateMachine::transition(&mut workflow, WorkflowEvent::Fail(message.clone()))?;
            retry_count
        };

        error!(
            workflow_id = workflow_id,
            step_id = %target.step_id,
            stage = %target.stage,
            capability = %target.capability,
            retry_count = retry_count,
            error = %message,
            "❌ Step failed, halting workflow"
        );
        self.events.publish(
            events::STEP_FAILED,
            json!({
                "workflow_id": workflow_id,
                "step_id": target.step_id,
                "capability": target.capability,
                "retry_count": retry_count,
                "error": message,
            }),
        );
        Ok(())
    }

    /// Best-effort artifact removal, then cancel the workflow if still active
    async fn rollback(&self, handle: &WorkflowHandle, workflow_id: &str) -> CleanupReport {
        let report = self.cleanup.run(workflow_id).await;

        let mut workflow = handle.lock();
        if !workflow.is_terminal() {
            if let Err(e) = WorkflowStateMachine::transition(
                &mut workflow,
                WorkflowEvent::cancel_with_reason(system::ROLLBACK_CANCELLATION_MESSAGE),
            ) {
                warn!(workflow_id = workflow_id, error = %e, "Rollback could not cancel workflow");
            }
        }
        report
    }

    /// Terminal bookkeeping: cleanup, final events and notification
    async fn finish(&self, handle: &WorkflowHandle, workflow_id: &str) -> WorkflowResult {
        let state = handle.lock().state;
        match state {
            WorkflowState::Completed => {
                self.cleanup.discard(workflow_id);
            }
            WorkflowState::Failed | WorkflowState::Cancelled => {
                self.rollback(handle, workflow_id).await;
            }
            _ => {}
        }

        let (result, update) = {
            let mut workflow = handle.lock();
            workflow.recompute_progress();
            workflow.touch();
            (
                WorkflowResult::from(&*workflow),
                ProgressUpdate::from_workflow(&workflow),
            )
        };

        let event = match result.state {
            WorkflowState::Completed => Some(events::WORKFLOW_COMPLETED),
            WorkflowState::Failed => Some(events::WORKFLOW_FAILED),
            _ => None,
        };
        if let Some(event) = event {
            self.events.publish(
                event,
                json!({
                    "workflow_id": workflow_id,
                    "progress_percentage": result.progress_percentage,
                    "error_message": result.error_message,
                    "duration_ms": result.duration_ms,
                }),
            );
        }

        info!(
            workflow_id = workflow_id,
            state = %result.state,
            progress = result.progress_percentage,
            "🏁 Workflow finished"
        );
        self.progress.notify(&update);
        result
    }
}

/// Paths listed under `artifacts` in a step's output
fn artifact_paths(output: &Payload) -> Vec<PathBuf> {
    output
        .get(payload_keys::ARTIFACTS)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}
