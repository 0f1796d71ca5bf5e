//! Batch size limits

use ferry_protocol::{DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_HITS};
use serde::Deserialize;

/// Batch limits imposed by the collector
///
/// # Example
///
/// ```toml
/// [batch]
/// max_hits = 500
/// max_bytes = 130000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum hits per batch
    /// Default: 500
    pub max_hits: usize,

    /// Maximum serialized bytes per batch
    /// Default: 130000
    pub max_bytes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_hits: DEFAULT_MAX_BATCH_HITS,
            max_bytes: DEFAULT_MAX_BATCH_BYTES,
        }
    }
}
