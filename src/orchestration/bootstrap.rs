//! # Orchestration Bootstrap
//!
//! Wires a queue, an orchestrator and the capability dispatcher together from
//! configuration and hands back a handle for lifecycle management.
//!
//! ```rust,no_run
//! use fabflow_core::config::ConfigManager;
//! use fabflow_core::orchestration::OrchestrationSystem;
//! use fabflow_core::registry::CapabilityRegistry;
//!
//! # async fn example() -> fabflow_core::Result<()> {
//! let config_manager = ConfigManager::load()?;
//! let registry = CapabilityRegistry::new();
//! // register research/cad/slicer/printer capabilities here
//!
//! let mut system = OrchestrationSystem::bootstrap(config_manager, registry)?;
//! let id = system.orchestrator().create_workflow("replacement knob", None)?;
//! let result = system.orchestrator().execute_workflow(&id).await?;
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::dispatcher::{CapabilityDispatcher, DispatcherHandle};
use super::orchestrator::WorkflowOrchestrator;
use crate::config::{ConfigManager, FabflowConfig};
use crate::error::Result;
use crate::messaging::{MessageQueue, QueueStatistics};
use crate::registry::CapabilityRegistry;

/// Running orchestration system
pub struct OrchestrationSystemHandle {
    orchestrator: Arc<WorkflowOrchestrator>,
    queue: Arc<MessageQueue>,
    dispatcher: Option<DispatcherHandle>,
    config_manager: Arc<ConfigManager>,
}

/// System status information
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub active_workflows: usize,
    pub total_workflows: usize,
    pub capabilities: Vec<String>,
    pub queue: QueueStatistics,
}

impl OrchestrationSystemHandle {
    pub fn orchestrator(&self) -> &Arc<WorkflowOrchestrator> {
        &self.orchestrator
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// Check if the dispatcher is still consuming requests
    pub fn is_running(&self) -> bool {
        self.dispatcher
            .as_ref()
            .is_some_and(DispatcherHandle::is_running)
    }

    pub async fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            active_workflows: self.orchestrator.active_workflow_count(),
            total_workflows: self.orchestrator.workflow_count(),
            capabilities: self.orchestrator.registry().names(),
            queue: self.queue.stats().await,
        }
    }

    /// Stop the dispatcher; workflows still waiting on responses will time out
    pub async fn shutdown(&mut self) {
        match self.dispatcher.take() {
            Some(dispatcher) => {
                dispatcher.shutdown().await;
                info!("🛑 Orchestration system shut down");
            }
            None => warn!("Orchestration system already stopped"),
        }
    }
}

/// Entry point for building a running system
pub struct OrchestrationSystem;

impl OrchestrationSystem {
    /// Build queue and orchestrator, then start the dispatcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn bootstrap(
        config_manager: Arc<ConfigManager>,
        registry: CapabilityRegistry,
    ) -> Result<OrchestrationSystemHandle> {
        let config = config_manager.config();
        config.validate()?;

        let queue = Arc::new(MessageQueue::from_config(&config.queue));
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            config,
            Arc::clone(&queue),
            registry.clone(),
        ));

        let missing: Vec<&str> = crate::models::PipelineStage::ALL
            .iter()
            .map(|stage| config.pipeline.capability_for(*stage))
            .filter(|name| !registry.contains(name))
            .collect();
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Pipeline capabilities not registered; their steps will fail"
            );
        }

        let dispatcher = CapabilityDispatcher::new(
            Arc::clone(&queue),
            registry,
            orchestrator.response_table(),
            config.queue.receive_poll_timeout(),
        )
        .start();

        info!(
            environment = config_manager.environment(),
            max_concurrent_workflows = config.orchestration.max_concurrent_workflows,
            capabilities = ?orchestrator.registry().names(),
            "✅ Orchestration system bootstrapped"
        );

        Ok(OrchestrationSystemHandle {
            orchestrator,
            queue,
            dispatcher: Some(dispatcher),
            config_manager,
        })
    }

    /// Bootstrap from an in-code configuration
    pub fn bootstrap_with_config(
        config: FabflowConfig,
        registry: CapabilityRegistry,
    ) -> Result<OrchestrationSystemHandle> {
        let config_manager = ConfigManager::from_config(config)?;
        Self::bootstrap(config_manager, registry)
    }
}
