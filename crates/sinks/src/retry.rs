//! Backoff policy for collector retries

use std::time::Duration;

use ferry_config::RetryConfig;
use rand::Rng;

/// Bounded exponential backoff with jitter
///
/// Attempt numbers are 1-based retries: `delay(1)` is the wait before the
/// second collector call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total collector calls per batch, including the first
    pub max_attempts: u32,
    /// Calls spent on a failed subset once part of the batch succeeded
    pub partial_retry_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the delay randomized in either direction (0.0..=1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            partial_retry_attempts: config.partial_retry_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            multiplier: config.multiplier,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Policy without waits, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            partial_retry_attempts: max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Backoff before retry `attempt`, before jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Wait before retry `attempt`
    ///
    /// A collector `retry_after` hint raises the wait but never past
    /// `max_delay`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(attempt);
        let jittered = if self.jitter > 0.0 && !backoff.is_zero() {
            let factor = rand::rng().random_range(1.0 - self.jitter..=1.0 + self.jitter);
            backoff.mul_f64(factor)
        } else {
            backoff
        };

        jittered
            .max(retry_after.unwrap_or(Duration::ZERO))
            .min(self.max_delay)
    }
}
