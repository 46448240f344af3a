//! Scripted capabilities for driving workflows through specific paths

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fabflow_core::messaging::{CapabilityResponse, Message, Payload};
use fabflow_core::registry::{CapabilityHandler, CapabilityRegistry};
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::builders::PIPELINE_CAPABILITIES;

/// Echoes its input and stamps the capability name into the output
pub struct EchoCapability {
    name: String,
}

impl EchoCapability {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for EchoCapability {
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse> {
        let mut data: Payload = request.payload.clone();
        data.insert(format!("{}_done", self.name), Value::Bool(true));
        Ok(CapabilityResponse::success(data))
    }
}

/// Answers with a failure response for the first `failures` calls, then succeeds
pub struct FlakyCapability {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyCapability {
    pub fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                failures,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl CapabilityHandler for FlakyCapability {
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Ok(CapabilityResponse::failure(format!("attempt {call} failed")));
        }
        Ok(CapabilityResponse::success(request.payload.clone()))
    }
}

/// Always answers with the same failure
pub struct FailingCapability {
    error: String,
    calls: Arc<AtomicU32>,
}

impl FailingCapability {
    pub fn new(error: &str) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                error: error.to_string(),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl CapabilityHandler for FailingCapability {
    async fn handle(&self, _request: &Message) -> anyhow::Result<CapabilityResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CapabilityResponse::failure(self.error.clone()))
    }
}

/// Signals `entered` and holds the request until `release` is notified
pub struct GatedCapability {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedCapability {
    pub fn new() -> (Self, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        (
            Self {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            },
            entered,
            release,
        )
    }
}

#[async_trait]
impl CapabilityHandler for GatedCapability {
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(CapabilityResponse::success(request.payload.clone()))
    }
}

/// Writes a file under `dir` and reports it as an artifact
pub struct ArtifactCapability {
    dir: PathBuf,
    file_name: String,
}

impl ArtifactCapability {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.to_string(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for ArtifactCapability {
    async fn handle(&self, request: &Message) -> anyhow::Result<CapabilityResponse> {
        let path = self.dir.join(&self.file_name);
        tokio::fs::write(&path, b"solid model").await?;

        let mut data = request.payload.clone();
        data.insert("artifacts".to_string(), json!([path.to_string_lossy()]));
        Ok(CapabilityResponse::success(data))
    }
}

/// Registry with an echo capability for every pipeline stage except `skip`
pub fn echo_registry_except(skip: &[&str]) -> CapabilityRegistry {
    let registry = CapabilityRegistry::new();
    for name in PIPELINE_CAPABILITIES {
        if !skip.contains(&name) {
            registry
                .register(name, EchoCapability::new(name))
                .expect("pipeline capability names are unique");
        }
    }
    registry
}

pub fn echo_registry() -> CapabilityRegistry {
    echo_registry_except(&[])
}
