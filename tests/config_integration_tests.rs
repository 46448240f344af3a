use std::path::PathBuf;
use std::sync::Arc;

use fabflow_core::config::{ConfigManager, ConfigurationError, FabflowConfig};
use fabflow_core::orchestration::OrchestrationSystem;
use fabflow_core::state_machine::WorkflowState;

mod common;
use common::*;

fn shipped_config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn test_shipped_base_config_matches_defaults() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "development")
            .unwrap();

    assert_eq!(manager.environment(), "development");
    assert_eq!(manager.config(), &FabflowConfig::default());
}

#[test]
fn test_shipped_environment_overlays() {
    let test = ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "test")
        .unwrap();
    assert_eq!(test.config().queue.capacity, Some(1000));
    assert_eq!(test.config().backoff.base_delay_ms, 1);
    // Keys absent from the overlay fall through to the base file
    assert_eq!(test.config().orchestration.step_max_retries, 3);

    let production =
        ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "production")
            .unwrap();
    assert_eq!(production.config().orchestration.max_concurrent_workflows, 50);
    assert_eq!(production.config().backoff.base_delay_ms, 1000);
}

#[test]
fn test_invalid_overlay_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("fabflow.staging.toml"),
        "[backoff]\nbase_delay_ms = 500\nmax_delay_ms = 100\n",
    )
    .unwrap();

    let err = ConfigManager::load_from_directory_with_env(Some(dir.path().to_path_buf()), "staging")
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
}

#[tokio::test]
async fn test_bootstrap_from_loaded_configuration() {
    let manager =
        ConfigManager::load_from_directory_with_env(Some(shipped_config_dir()), "test").unwrap();

    let mut system = OrchestrationSystem::bootstrap(Arc::clone(&manager), echo_registry()).unwrap();
    let status = system.status().await;
    assert_eq!(status.environment, "test");
    assert_eq!(status.capabilities.len(), 4);
    assert_eq!(status.queue.provider, "in_memory");

    let orchestrator = Arc::clone(system.orchestrator());
    let id = orchestrator.create_workflow("drawer pull", None).unwrap();
    let result = orchestrator.execute_workflow(&id).await.unwrap();
    assert_eq!(result.state, WorkflowState::Completed);

    system.shutdown().await;
    assert!(!system.status().await.running);
}
