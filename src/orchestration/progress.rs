//! # Progress Notifier
//!
//! Per-workflow progress callbacks. Callbacks run outside every orchestrator
//! lock, and a panicking callback is logged and skipped. An update equal to
//! the previous one for the same workflow is not delivered again.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use super::types::ProgressUpdate;

/// Observer invoked on every workflow state transition
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

#[derive(Default)]
pub struct ProgressNotifier {
    callbacks: RwLock<HashMap<String, Vec<ProgressCallback>>>,
    last_delivered: Mutex<HashMap<String, ProgressUpdate>>,
}

impl std::fmt::Debug for ProgressNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressNotifier")
            .field("workflows", &self.callbacks.read().len())
            .finish()
    }
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workflow_id: &str, callback: ProgressCallback) {
        self.callbacks
            .write()
            .entry(workflow_id.to_string())
            .or_default()
            .push(callback);
    }

    /// Forget every callback of a workflow
    pub fn remove(&self, workflow_id: &str) {
        self.callbacks.write().remove(workflow_id);
        self.last_delivered.lock().remove(workflow_id);
    }

    pub fn callback_count(&self, workflow_id: &str) -> usize {
        self.callbacks
            .read()
            .get(workflow_id)
            .map_or(0, Vec::len)
    }

    /// Invoke each callback of the update's workflow, returning how many returned normally
    ///
    /// Repeats of the last delivered update are dropped and return 0.
    pub fn notify(&self, update: &ProgressUpdate) -> usize {
        let callbacks = match self.callbacks.read().get(&update.workflow_id) {
            Some(callbacks) => callbacks.clone(),
            None => return 0,
        };

        {
            let mut last = self.last_delivered.lock();
            if last.get(&update.workflow_id) == Some(update) {
                return 0;
            }
            last.insert(update.workflow_id.clone(), update.clone());
        }

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(update))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(
                        workflow_id = %update.workflow_id,
                        state = %update.state,
                        "Progress callback panicked; ignoring"
                    );
                }
            }
        }
        delivered
    }
}
