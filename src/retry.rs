//! Bounded-retry policy for transient provider errors.
//!
//! Rate-limit (429) and transient 5xx errors from LLM APIs are frequent
//! enough that a single vision-extraction request would fail regularly
//! without retries. Keeping the attempt ceiling and backoff curve in one
//! value — rather than hard-coding sleeps at the call site — lets the
//! scheduling model stay an implementation detail: production sleeps on the
//! tokio timer, tests pause the clock and assert the exact delays.

use std::time::Duration;

use crate::llm::LlmError;

/// How many times to attempt a provider call and how long to wait between
/// failures.
///
/// The delay after the Nth failed attempt is `base * 2^N`, so the default
/// 1-second base yields the 2s → 4s sequence between three attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be ≥ 1.
    pub max_attempts: u32,
    /// Base unit for the exponential backoff curve.
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after `failed_attempts` failures (1-based).
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        self.base * 2u32.saturating_pow(failed_attempts)
    }

    /// Whether the error class may be retried at all.
    ///
    /// Request-validation failures (malformed/oversized payload) abort
    /// immediately: resending the same bad request can never succeed.
    pub fn is_retryable(&self, error: &LlmError) -> bool {
        error.is_retryable()
    }

    /// Whether another attempt is permitted after `failed_attempts` failures.
    pub fn allows_another(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }
}
