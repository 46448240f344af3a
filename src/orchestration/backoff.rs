//! # Backoff Calculator
//!
//! Exponential delay between step retry attempts:
//! `min(base × multiplier^(retry_count − 1), max)`.

use std::time::Duration;

use crate::config::BackoffConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl BackoffCalculator {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Delay before the attempt following the `retry_count`-th failure
    ///
    /// `retry_count` is the value after incrementing, so the first retry waits
    /// exactly the base delay.
    pub fn delay_for_retry(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_ms = self.config.base_delay_ms as f64;
        let max_ms = self.config.max_delay_ms as f64;

        let delay_ms = base_ms * self.config.multiplier.powi(exponent);
        let capped_ms = if delay_ms.is_finite() {
            delay_ms.min(max_ms)
        } else {
            max_ms
        };

        Duration::from_millis(capped_ms.max(0.0) as u64)
    }
}
