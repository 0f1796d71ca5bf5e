//! Pipeline run settings

use serde::Deserialize;

/// Pipeline run configuration
///
/// # Example
///
/// ```toml
/// [pipeline]
/// name = "bq_to_ga4_conversions"
/// read_batch_rows = 1000
/// fatal_failure_threshold = 3
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Configuration identity; keys the persisted cursor and the run lock
    pub name: String,

    /// Rows requested from the source per read
    /// Default: 1000
    pub read_batch_rows: usize,

    /// Consecutive batches with permanent send failures before the run aborts.
    /// 0 disables the threshold.
    /// Default: 3
    pub fatal_failure_threshold: u32,

    /// Overlap assembling the next batch with sending the current one
    /// Default: true
    pub pipelining: bool,

    /// Failure records kept in the run summary
    /// Default: 1000
    pub max_failure_records: usize,

    /// Recent dedup keys remembered for in-run duplicate detection
    /// Default: 1000000
    pub dedup_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            read_batch_rows: 1000,
            fatal_failure_threshold: 3,
            pipelining: true,
            max_failure_records: 1000,
            dedup_window: 1_000_000,
        }
    }
}
