//! # Cleanup Registry
//!
//! Artifacts produced by completed steps, recorded per workflow and removed
//! best-effort when the workflow fails or is cancelled. Removal failures are
//! logged and reported, never raised.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::errors::OrchestrationError;

/// What a rollback managed to remove
#[derive(Debug, Default, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Already gone before cleanup ran
    pub missing: Vec<PathBuf>,
    #[serde(skip)]
    pub failures: Vec<OrchestrationError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CleanupRegistry {
    artifacts: Mutex<HashMap<String, Vec<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, workflow_id: &str, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(workflow_id = workflow_id, path = %path.display(), "Artifact recorded");
        self.artifacts
            .lock()
            .entry(workflow_id.to_string())
            .or_default()
            .push(path);
    }

    pub fn artifacts(&self, workflow_id: &str) -> Vec<PathBuf> {
        self.artifacts
            .lock()
            .get(workflow_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a workflow's artifacts without touching the files
    pub fn discard(&self, workflow_id: &str) -> usize {
        self.artifacts
            .lock()
            .remove(workflow_id)
            .map_or(0, |paths| paths.len())
    }

    /// Remove every recorded artifact of a workflow, newest first
    pub async fn run(&self, workflow_id: &str) -> CleanupReport {
        let paths = self.artifacts.lock().remove(workflow_id).unwrap_or_default();
        let mut report = CleanupReport::default();

        for path in paths.into_iter().rev() {
            match remove_path(&path).await {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == ErrorKind::NotFound => report.missing.push(path),
                Err(e) => {
                    warn!(
                        workflow_id = workflow_id,
                        path = %path.display(),
                        error = %e,
                        "Artifact cleanup failed"
                    );
                    report.failures.push(OrchestrationError::Cleanup {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.removed.is_empty() || !report.failures.is_empty() {
            info!(
                workflow_id = workflow_id,
                removed = report.removed.len(),
                missing = report.missing.len(),
                failed = report.failures.len(),
                "🧹 Rollback cleanup finished"
            );
        }
        report
    }
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}
