//! Send retry policy

use std::time::Duration;

use serde::Deserialize;

/// Retry policy for collector calls
///
/// Delays grow exponentially from `base_delay` and are capped at
/// `max_delay`; `jitter` randomizes each delay by up to that fraction.
///
/// # Example
///
/// ```toml
/// [retry]
/// max_attempts = 5
/// base_delay = "500ms"
/// max_delay = "30s"
/// jitter = 0.2
/// partial_retry_attempts = 2
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first
    /// Default: 5
    pub max_attempts: u32,

    /// First backoff delay
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Backoff ceiling
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Backoff multiplier
    /// Default: 2.0
    pub multiplier: f64,

    /// Random jitter as a fraction of the delay (0.0 - 1.0)
    /// Default: 0.2
    pub jitter: f64,

    /// Re-sends of a rejected subset after a partial result.
    /// Rejections reported per item are permanent unless the collector marks
    /// them transient, so this only bounds transient per-item failures.
    /// Default: 2
    pub partial_retry_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            partial_retry_attempts: 2,
        }
    }
}
