//! Bounded exponential backoff for transient upload failures.
//!
//! # Delay Calculation
//!
//! ```text
//! delay(n) = base_delay * 2^n + uniform[0, 2s)
//! ```
//!
//! The k-th transient failure (1-indexed) waits `delay(k - 1)`: roughly
//! 1s, 2s, 4s, 8s and so on, each with up to two seconds of jitter.
//!
//! # Example
//!
//! ```
//! use uploader_core::publish::{ApiError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = ApiError::from_status(503, "backend unavailable");
//!
//! match policy.should_retry(&error, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::error::ApiError;

/// Default transient-failure budget per upload.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Base delay for the first retry (1 second).
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound (exclusive) of the jitter added to each delay, in seconds.
const MAX_JITTER_SECS: f64 = 2.0;

/// Exponent cap; keeps the computed delay representable.
const MAX_EXPONENT: i32 = 32;

/// Decision on whether to re-send after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-send after the given delay.
    Retry {
        /// How long to wait before re-sending.
        delay: Duration,
        /// The failure count this decision was made for (1-indexed).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry budget for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of transient failures that ends the upload.
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy that gives up on the `max_retries`-th transient
    /// failure. Values below 1 are raised to 1.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
        }
    }

    /// Returns the configured budget.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides what to do about transient-or-permanent failure number
    /// `failures` (1-indexed, counting transient failures only).
    #[instrument(skip(self, error), fields(max_retries = self.max_retries, transient = error.is_transient()))]
    pub fn should_retry(&self, error: &ApiError, failures: u32) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if failures >= self.max_retries {
            debug!(failures, max = self.max_retries, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("max retries ({}) exhausted", self.max_retries),
            };
        }

        let delay = backoff_delay(failures.saturating_sub(1));
        debug!(failures, delay_ms = delay.as_millis(), "will retry");

        RetryDecision::Retry {
            delay,
            attempt: failures,
        }
    }
}

/// Delay before the retry that follows `n` earlier retries.
///
/// Always within `[2^n, 2^n + 2)` seconds.
#[must_use]
pub fn backoff_delay(n: u32) -> Duration {
    let exponent = i32::try_from(n).map_or(MAX_EXPONENT, |n| n.min(MAX_EXPONENT));
    let base = BASE_DELAY.as_secs_f64() * 2f64.powi(exponent);
    Duration::from_secs_f64(base + jitter_secs())
}

fn jitter_secs() -> f64 {
    rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_budget() {
        assert_eq!(RetryPolicy::default().max_retries(), 10);
    }

    #[test]
    fn test_retry_policy_minimum_is_one() {
        assert_eq!(RetryPolicy::new(0).max_retries(), 1);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(&ApiError::from_status(400, "bad request"), 1);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_transient_failure_below_budget_is_retried() {
        let policy = RetryPolicy::new(3);
        let error = ApiError::from_status(503, "unavailable");

        for failures in 1..3 {
            match policy.should_retry(&error, failures) {
                RetryDecision::Retry { attempt, .. } => assert_eq!(attempt, failures),
                other => panic!("Expected Retry at {failures}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn test_transient_failure_at_budget_is_fatal() {
        let policy = RetryPolicy::new(3);
        let decision = policy.should_retry(&ApiError::from_status(500, "boom"), 3);
        match decision {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("max retries (3)")),
            other => panic!("Expected DoNotRetry, got: {other:?}"),
        }
    }

    #[test]
    fn test_first_retry_delay_is_about_one_second() {
        let policy = RetryPolicy::default();
        match policy.should_retry(&ApiError::from_status(502, "bad gateway"), 1) {
            RetryDecision::Retry { delay, .. } => {
                assert!(delay >= Duration::from_secs(1));
                assert!(delay < Duration::from_secs(3));
            }
            other => panic!("Expected Retry, got: {other:?}"),
        }
    }

    // ==================== Backoff Tests ====================

    #[test]
    fn test_backoff_delay_bounds() {
        for n in 0..8 {
            let floor = Duration::from_secs(1 << n);
            let ceiling = floor + Duration::from_secs(2);
            // 100 samples per exponent
            for _ in 0..100 {
                let delay = backoff_delay(n);
                assert!(delay >= floor, "delay {delay:?} below {floor:?} for n={n}");
                assert!(delay < ceiling, "delay {delay:?} not below {ceiling:?} for n={n}");
            }
        }
    }

    #[test]
    fn test_jitter_distribution() {
        let samples: Vec<f64> = (0..100).map(|_| jitter_secs()).collect();

        assert!(samples.iter().all(|j| (0.0..2.0).contains(j)));

        let mean = samples.iter().sum::<f64>() / 100.0;
        assert!(
            (0.6..1.4).contains(&mean),
            "Jitter mean {mean}s not near 1s (expected 0.6-1.4s range)"
        );
    }

    #[test]
    fn test_backoff_delay_large_exponent_does_not_panic() {
        let delay = backoff_delay(u32::MAX);
        assert!(delay >= Duration::from_secs(1 << 32));
    }
}
