//! # Fabflow Configuration System
//!
//! Typed configuration for the queue, the orchestrator, retry backoff and the
//! pipeline's capability names. Every section has working defaults, so an empty
//! configuration directory yields a usable system.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fabflow_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let timeout = manager.config().orchestration.step_response_timeout();
//! let capacity = manager.config().queue.capacity;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::models::PipelineStage;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring fabflow.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FabflowConfig {
    /// Message queue settings
    pub queue: QueueConfig,

    /// Workflow orchestration settings
    pub orchestration: OrchestrationConfig,

    /// Backoff between step retries
    pub backoff: BackoffConfig,

    /// Capability names for each pipeline stage
    pub pipeline: PipelineConfig,
}

/// Message queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum pending plus in-flight messages; unbounded when unset
    pub capacity: Option<usize>,
    /// Retry budget stamped on request messages
    pub default_max_retries: u32,
    /// Failed/expired messages kept for introspection
    pub dead_letter_capacity: usize,
    /// How long the dispatcher waits on an empty queue before re-checking shutdown
    pub receive_poll_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            default_max_retries: 3,
            dead_letter_capacity: 1000,
            receive_poll_timeout_ms: 100,
        }
    }
}

impl QueueConfig {
    pub fn receive_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_poll_timeout_ms)
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Cap on non-terminal workflows held by one orchestrator
    pub max_concurrent_workflows: usize,
    /// How long a step attempt waits for its correlated response
    pub step_response_timeout_ms: u64,
    /// Retry budget for each workflow step
    pub step_max_retries: u32,
    /// Sender name stamped on request messages
    pub sender_name: String,
    /// Lifecycle event channel capacity
    pub event_buffer_size: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workflows: 10,
            step_response_timeout_ms: 300_000,
            step_max_retries: 3,
            sender_name: "orchestrator".to_string(),
            event_buffer_size: 1000,
        }
    }
}

impl OrchestrationConfig {
    pub fn step_response_timeout(&self) -> Duration {
        Duration::from_millis(self.step_response_timeout_ms)
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Capability names the pipeline routes each stage to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub research_capability: String,
    pub cad_capability: String,
    pub slicing_capability: String,
    pub printing_capability: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            research_capability: "research_agent".to_string(),
            cad_capability: "cad_agent".to_string(),
            slicing_capability: "slicer_agent".to_string(),
            printing_capability: "printer_agent".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Capability name serving a stage
    pub fn capability_for(&self, stage: PipelineStage) -> &str {
        match stage {
            PipelineStage::Research => &self.research_capability,
            PipelineStage::Cad => &self.cad_capability,
            PipelineStage::Slicing => &self.slicing_capability,
            PipelineStage::Printing => &self.printing_capability,
        }
    }
}

impl FabflowConfig {
    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.capacity == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "queue.capacity",
                "0",
                "capacity must be positive or unset for an unbounded queue",
            ));
        }

        if self.queue.receive_poll_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.receive_poll_timeout_ms",
                "0",
                "poll timeout must be positive",
            ));
        }

        if self.orchestration.max_concurrent_workflows == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.max_concurrent_workflows",
                "0",
                "at least one workflow must be allowed",
            ));
        }

        if self.orchestration.step_response_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.step_response_timeout_ms",
                "0",
                "step response timeout must be positive",
            ));
        }

        if self.orchestration.sender_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "orchestration.sender_name",
                "",
                "sender name must not be empty",
            ));
        }

        if self.orchestration.event_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.event_buffer_size",
                "0",
                "event buffer must hold at least one event",
            ));
        }

        if !(self.backoff.multiplier.is_finite() && self.backoff.multiplier >= 1.0) {
            return Err(ConfigurationError::invalid_value(
                "backoff.multiplier",
                self.backoff.multiplier.to_string(),
                "multiplier must be a finite number >= 1.0",
            ));
        }

        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.max_delay_ms",
                self.backoff.max_delay_ms.to_string(),
                format!(
                    "max delay must be >= base delay ({}ms)",
                    self.backoff.base_delay_ms
                ),
            ));
        }

        let mut seen = HashSet::new();
        for stage in PipelineStage::ALL {
            let name = self.pipeline.capability_for(stage);
            if name.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    format!("pipeline.{}_capability", stage.as_str()),
                    name,
                    "capability name must not be empty",
                ));
            }
            if !seen.insert(name) {
                return Err(ConfigurationError::invalid_value(
                    format!("pipeline.{}_capability", stage.as_str()),
                    name,
                    "each stage needs a distinct capability",
                ));
            }
        }

        Ok(())
    }
}
