//! Retry policy for HTTP requests

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// Predicate deciding whether a failed attempt should be retried.
///
/// Receives the classified error and the 1-based attempt number that just
/// failed. Attempt accounting stays with the client; the predicate only
/// judges the error.
pub type RetryPredicate = Arc<dyn Fn(&Error, u32) -> bool + Send + Sync>;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, first try included
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound on any computed delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Compute the backoff delay after the given failed attempt (1-based).
    ///
    /// Exponential with jitter:
    /// `min(max_delay, base_delay * 2^(attempt-1) * rand(0.5, 1.0))`.
    /// The randomized scaling avoids synchronized retry storms across clients
    /// while `max_delay` bounds worst-case latency.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let base = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let jittered = base * (0.5 + rand::random::<f64>() * 0.5);
        Duration::from_secs_f64(jittered.min(self.max_delay.as_secs_f64()))
    }
}

/// Default retry predicate: retry network faults, timeouts, and 5xx responses;
/// never retry authentication or validation failures.
pub fn default_retry_predicate(error: &Error, _attempt: u32) -> bool {
    error.is_retryable()
}
