//! Source error types

use ferry_protocol::{Cursor, RowId};
use thiserror::Error;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors raised while reading rows
///
/// `MalformedRecord` is row-local and travels inside a `ReadBatch`; every
/// other variant ends the run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store cannot be reached or refused the read
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Columns the schema needs are absent from the source
    #[error("schema mismatch in {location}: missing columns {}", missing.join(", "))]
    SchemaMismatch {
        location: String,
        missing: Vec<String>,
    },

    /// A single row could not be parsed
    #[error("malformed record at {row}: {reason}")]
    MalformedRecord {
        row: RowId,
        /// Cursor after the malformed row
        position: Cursor,
        reason: String,
    },

    /// The resume cursor was produced by a different kind of source
    #[error("cursor {0} does not belong to this source")]
    IncompatibleCursor(Cursor),
}

impl SourceError {
    /// Create an Unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether this error ends the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedRecord { .. })
    }
}

impl From<object_store::Error> for SourceError {
    fn from(e: object_store::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}
