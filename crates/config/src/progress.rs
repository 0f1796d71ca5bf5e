//! Progress (cursor) store configuration

use std::path::PathBuf;

use serde::Deserialize;

/// Where committed cursors are persisted
///
/// Each pipeline gets `<dir>/<name>.cursor` plus a `<name>.lock` file that
/// keeps two runs of the same pipeline from writing concurrently.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Directory holding cursor and lock files
    /// Default: "state"
    pub dir: PathBuf,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("state"),
        }
    }
}
