//! Bounded retry with backoff for externally-fallible steps.
//!
//! Every network-facing step (catalog fetch, metadata lookup, summarization,
//! upload) goes through [`run_with_retry`]. Errors decide for themselves
//! whether another attempt can help via [`Retryable`]; terminal errors are
//! returned on the first failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Classification of a failure as transient or terminal
pub trait Retryable {
    /// True if a later attempt may succeed
    fn is_retryable(&self) -> bool;
}

/// Retry policy: attempt budget plus the delays slept between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the n-th failed attempt, in milliseconds.
    /// The last entry repeats if attempts outnumber the schedule.
    #[serde(default = "default_light_delays")]
    pub delays_ms: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_light_delays() -> Vec<u64> {
    vec![1000, 2000, 4000]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::light()
    }
}

impl RetryPolicy {
    /// Schedule for cheap operations: 3 attempts, 1s/2s/4s
    pub fn light() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_ms: default_light_delays(),
        }
    }

    /// Schedule for uploads: 5 attempts, 2s/5s/10s/20s/40s
    pub fn upload() -> Self {
        Self {
            max_attempts: 5,
            delays_ms: vec![2000, 5000, 10000, 20000, 40000],
        }
    }

    /// A single attempt, never sleeps
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delays_ms: vec![0],
        }
    }

    /// Calculate delay after a specific failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let ms = self
            .delays_ms
            .get(index)
            .or_else(|| self.delays_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Reject policies that cannot run or whose delays shrink
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.delays_ms.is_empty() {
            return Err("delays_ms must not be empty".to_string());
        }
        if self.delays_ms.windows(2).any(|w| w[1] < w[0]) {
            return Err(format!(
                "delays_ms must be non-decreasing, got {:?}",
                self.delays_ms
            ));
        }
        Ok(())
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt
/// budget is spent. The closure receives the 1-indexed attempt number.
///
/// On exhaustion the last error is returned unchanged.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match f(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_retryable() {
                    debug!(operation, attempt, error = %e, "Terminal failure, not retrying");
                    return Err(e);
                }

                if !policy.should_retry(attempt) {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
