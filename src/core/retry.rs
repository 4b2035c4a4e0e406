//! Retry policy shared by session creation and per-call scoring.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    pub max_attempts: u32,

    /// Delay unit; the wait after attempt `n` is `n` units
    pub backoff_unit_ms: u64,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, backoff_unit_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit_ms,
        }
    }

    /// Delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(attempt.max(1) as u64))
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
