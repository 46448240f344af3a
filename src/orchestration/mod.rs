//! # Orchestration
//!
//! Workflow execution over the message queue: the orchestrator, the
//! dispatcher that feeds capabilities, response correlation, retry backoff,
//! rollback cleanup and progress fan-out.

pub mod backoff;
pub mod bootstrap;
pub mod cleanup;
pub mod dispatcher;
pub mod errors;
pub mod orchestrator;
pub mod progress;
pub mod response_table;
pub mod types;

pub use backoff::BackoffCalculator;
pub use bootstrap::{OrchestrationSystem, OrchestrationSystemHandle, SystemStatus};
pub use cleanup::{CleanupRegistry, CleanupReport};
pub use dispatcher::{CapabilityDispatcher, DispatcherHandle};
pub use errors::{OrchestrationError, OrchestrationResult};
pub use orchestrator::WorkflowOrchestrator;
pub use progress::{ProgressCallback, ProgressNotifier};
pub use response_table::{DeliveryOutcome, ResponseTable};
pub use types::{ProgressUpdate, StepReport, WorkflowResult, WorkflowStatusReport, WorkflowSummary};
