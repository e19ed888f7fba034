//! Reconnect backoff policy.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff with a cap, subtractive jitter and an optional
/// retry ceiling.
///
/// The wait before retry `attempt` (0-based) is
/// `min(max, base * 2^attempt)`, shortened by a random fraction in
/// `[0, jitter)` of itself. Jitter only ever shortens the wait, so it
/// never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Wait before the first retry.
    pub base: Duration,
    /// Upper bound on any wait.
    pub max: Duration,
    /// Consecutive failures tolerated before giving up; `None` retries
    /// forever.
    pub max_retries: Option<u32>,
    /// Fraction of each wait that may be randomly removed, in `[0, 1)`.
    pub jitter: f64,
}

impl BackoffPolicy {
    /// Build the policy from validated configuration.
    pub const fn from_config(config: &BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            max: Duration::from_millis(config.max_ms),
            max_retries: config.max_retries,
            jitter: config.jitter,
        }
    }

    /// The un-jittered wait before retry `attempt`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |wait| wait.min(self.max))
    }

    /// The wait before retry `attempt`, with jitter applied.
    ///
    /// A jitter outside `[0, 1]` is clamped into it; a non-finite jitter
    /// counts as none.
    pub fn delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let ceiling = self.ceiling(attempt);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter <= 0.0 {
            return ceiling;
        }
        let cut = rng.random_range(0.0..jitter);
        ceiling.mul_f64(1.0 - cut)
    }

    /// Whether another retry is allowed after `failures` consecutive
    /// failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_retries.is_none_or(|limit| failures <= limit)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
