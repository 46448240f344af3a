//! # Queue Backend Types

use serde::{Deserialize, Serialize};

/// Point-in-time counters reported by a queue backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStats {
    /// Messages waiting to be delivered
    pub pending: usize,
    /// Messages delivered but not yet acknowledged
    pub in_flight: usize,
    /// Configured capacity bound, if any
    pub capacity: Option<usize>,
    /// Messages acknowledged since creation
    pub completed_total: u64,
    /// Messages dropped after exhausting retries or rejected without requeue
    pub failed_total: u64,
    /// Messages swept past their deadline
    pub expired_total: u64,
    /// Messages returned to the queue by a requeueing nack
    pub requeued_total: u64,
}

impl BackendStats {
    /// Pending plus in-flight
    pub fn size(&self) -> usize {
        self.pending + self.in_flight
    }

    /// Check if a bounded backend has no room left
    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|limit| self.size() >= limit)
    }
}
