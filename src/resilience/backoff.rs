//! Exponential backoff and per-cycle retry bookkeeping.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryPolicy;

/// Calculate the delay before reconnect attempt `attempt` (starting at 1).
///
/// `min(initial * 2^(attempt-1), max)`, saturating on overflow.
pub fn next_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    initial
        .checked_mul(factor)
        .map_or(max, |delay| delay.min(max))
}

/// Add up to 10% jitter to `delay` without exceeding `max`.
pub fn with_jitter(delay: Duration, max: Duration) -> Duration {
    let jitter_range = delay.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    (delay + Duration::from_millis(jitter)).min(max)
}

/// Attempt counter for one reconnection cycle.
///
/// Reset on every successful bind; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryContext {
    attempts: u32,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect attempts scheduled so far in this cycle.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts >= policy.max_retries
    }

    /// Reserve the next attempt and return its delay, or `None` once the
    /// policy's `max_retries` have all been scheduled.
    pub fn schedule(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        if self.is_exhausted(policy) {
            return None;
        }

        self.attempts += 1;
        let base = next_delay(self.attempts, policy.initial_delay, policy.max_delay);
        let delay = if policy.jitter {
            with_jitter(base, policy.max_delay)
        } else {
            base
        };
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
