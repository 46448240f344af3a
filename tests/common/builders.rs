use fabflow_core::config::{
    BackoffConfig, FabflowConfig, OrchestrationConfig, PipelineConfig, QueueConfig,
};
use fabflow_core::messaging::{Message, MessagePriority, Payload};
use fabflow_core::orchestration::{OrchestrationSystem, OrchestrationSystemHandle};
use fabflow_core::registry::CapabilityRegistry;
use serde_json::json;

pub const PIPELINE_CAPABILITIES: [&str; 4] =
    ["research_agent", "cad_agent", "slicer_agent", "printer_agent"];

/// Configuration with millisecond backoff and short response timeouts
pub fn fast_config() -> FabflowConfig {
    FabflowConfig {
        queue: QueueConfig {
            receive_poll_timeout_ms: 5,
            ..QueueConfig::default()
        },
        orchestration: OrchestrationConfig {
            max_concurrent_workflows: 8,
            step_response_timeout_ms: 1_000,
            step_max_retries: 3,
            ..OrchestrationConfig::default()
        },
        backoff: BackoffConfig {
            base_delay_ms: 1,
            max_delay_ms: 10,
            multiplier: 2.0,
        },
        pipeline: PipelineConfig::default(),
    }
}

pub fn start_system(config: FabflowConfig, registry: CapabilityRegistry) -> OrchestrationSystemHandle {
    OrchestrationSystem::bootstrap_with_config(config, registry)
        .expect("test configuration should bootstrap")
}

pub fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

/// Request addressed to `receiver` with a tagged payload
pub fn tagged_message(receiver: &str, tag: &str, priority: MessagePriority) -> Message {
    Message::request("test", receiver, payload(json!({ "tag": tag }))).with_priority(priority)
}

pub fn tag_of(message: &Message) -> String {
    message.payload["tag"].as_str().unwrap_or_default().to_string()
}
