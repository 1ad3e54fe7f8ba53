//! Retry policy for directory calls
//!
//! Retryable failures are retried up to `max_attempts` with exponential
//! backoff: `base_delay_ms * 2^(attempt - 1)`, capped at `max_delay_ms`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of attempts per task
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default first backoff delay
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default backoff cap
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// Retry and timeout policy applied to every task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before a retryable failure becomes final
    pub max_attempts: u32,
    /// First backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Per-call timeout in milliseconds
    pub call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt limit and base delay
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Override the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override the backoff cap
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay_ms = max_delay.as_millis() as u64;
        self
    }

    /// Whether another attempt is allowed after `attempt` attempts
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-indexed)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = 2_u64.saturating_pow(exponent);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Per-call timeout
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("retry.base_delay_ms must not exceed retry.max_delay_ms".to_string());
        }
        if self.call_timeout_ms == 0 {
            return Err("retry.call_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
