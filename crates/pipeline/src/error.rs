//! Pipeline error types
//!
//! Only fatal conditions are errors here. Row-local problems and per-hit
//! send failures are counted in the run summary instead.

use std::path::PathBuf;

use ferry_sources::SourceError;
use thiserror::Error;

/// Progress store errors
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Reading or writing the cursor file failed
    #[error("cursor store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored cursor cannot be decoded
    #[error("corrupt cursor at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Store refused the write (test stores)
    #[error("cursor store rejected write: {0}")]
    Rejected(String),
}

impl ProgressError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source unreachable, schema mismatch, or unusable cursor
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Committed cursor could not be loaded
    #[error("failed to load cursor: {0}")]
    LoadFailure(#[source] ProgressError),

    /// Committed cursor could not be persisted
    #[error("failed to commit cursor: {0}")]
    CommitFailure(#[source] ProgressError),

    /// Too many consecutive batches failed permanently
    #[error("{batches} consecutive batches failed permanently")]
    FailureThreshold { batches: u32 },

    /// Another run of the same pipeline holds the lock
    #[error("pipeline '{name}' is locked by {path}")]
    Locked { name: String, path: PathBuf },

    /// Lock file could not be created or removed
    #[error("lock file error at {path}: {source}")]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Run was cancelled externally
    #[error("run cancelled")]
    Cancelled,
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
