//! Exponential backoff for failed deliveries

use std::time::Duration;

use rand::Rng;

/// Retry configuration for the delivery queue
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Base delay in milliseconds before the first retry
    pub retry_delay_ms: u64,
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Jitter factor (0.0 to 1.0), 0.0 keeps delays exact
    pub jitter_factor: f64,
    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1000,
            max_retries: 3,
            jitter_factor: 0.0,
            max_delay_ms: 60_000,
        }
    }
}

/// Exponential backoff calculator.
///
/// Unlike a reconnect loop, every queued item carries its own attempt count,
/// so the calculator is stateless and keyed by that count.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether an item that has already failed `attempt_count` times may be
    /// retried once more.
    pub fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.config.max_retries
    }

    /// Delay before retry number `attempt` (1-based):
    /// `retry_delay * 2^(attempt - 1)`, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let capped = base.min(self.config.max_delay_ms) as f64;

        let final_delay = if self.config.jitter_factor > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.config.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            (capped + jitter).max(1.0) as u64
        } else {
            capped as u64
        };

        Duration::from_millis(final_delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
