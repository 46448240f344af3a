#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fabflow Core
//!
//! Coordination layer for a manufacturing pipeline that runs research, CAD
//! model generation, slicing and printing as independent capabilities.
//!
//! ## Overview
//!
//! Capabilities never call each other. The orchestrator sends each step's input
//! as a message through an in-memory priority queue, a dispatcher hands it to
//! the registered capability, and the correlated reply drives the workflow
//! state machine forward. Failed attempts are retried with exponential
//! backoff; a step that runs out of retries fails the workflow and rolls back
//! the artifacts recorded so far.
//!
//! Everything is single-process and in-memory. Nothing survives a restart.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Messages, the priority queue backend and its facade
//! - [`models`] - Workflow and step records
//! - [`state_machine`] - Workflow and step transitions
//! - [`registry`] - Capability name → handler lookup
//! - [`orchestration`] - Orchestrator, dispatcher, backoff, cleanup, progress
//! - [`events`] - Lifecycle event broadcast
//! - [`config`] - Configuration loading and validation
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust
//! use fabflow_core::config::FabflowConfig;
//! use fabflow_core::messaging::{CapabilityResponse, Message};
//! use fabflow_core::orchestration::OrchestrationSystem;
//! use fabflow_core::registry::{CapabilityRegistry, FnCapability};
//! use fabflow_core::state_machine::WorkflowState;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> fabflow_core::Result<()> {
//! let registry = CapabilityRegistry::new();
//! for name in ["research_agent", "cad_agent", "slicer_agent", "printer_agent"] {
//!     registry.register(
//!         name,
//!         FnCapability::new(|request: Message| async move {
//!             Ok(CapabilityResponse::success(request.payload))
//!         }),
//!     )?;
//! }
//!
//! let mut system = OrchestrationSystem::bootstrap_with_config(FabflowConfig::default(), registry)?;
//! let id = system.orchestrator().create_workflow("a cable clip", None)?;
//! let result = system.orchestrator().execute_workflow(&id).await?;
//! assert_eq!(result.state, WorkflowState::Completed);
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use config::{ConfigManager, FabflowConfig};
pub use constants::system;
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
pub use error::{FabflowError, Result};
pub use messaging::{Message, MessagePriority, MessageQueue, MessageStatus};
pub use models::{PipelineStage, Workflow, WorkflowStep};
pub use orchestration::{
    OrchestrationError, OrchestrationSystem, ProgressUpdate, WorkflowOrchestrator, WorkflowResult,
};
pub use registry::{CapabilityHandler, CapabilityRegistry, FnCapability};
