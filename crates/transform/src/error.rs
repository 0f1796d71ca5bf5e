//! Mapping error types
//!
//! A mapping error is row-local: the pipeline records it against the row
//! and moves on. It is never retried.

use std::fmt;

use ferry_protocol::RowId;
use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Why a row could not become a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingErrorKind {
    /// A required column is absent or null
    MissingField,
    /// A value cannot be coerced into its declared kind
    InvalidType,
    /// The event name is not in the allowed list
    EventNotAllowed,
    /// The event name breaks collector naming rules
    InvalidEventName,
    /// The pre-encoded payload column is not a usable event payload
    InvalidJsonStructure,
}

impl MappingErrorKind {
    /// Stable code used in failure records
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidType => "invalid_type",
            Self::EventNotAllowed => "event_not_allowed",
            Self::InvalidEventName => "invalid_event_name",
            Self::InvalidJsonStructure => "invalid_json_structure",
        }
    }
}

impl fmt::Display for MappingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A row that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{row}: {kind}: {reason}")]
pub struct MappingError {
    pub row: RowId,
    pub kind: MappingErrorKind,
    pub reason: String,
}

impl MappingError {
    pub fn new(row: &RowId, kind: MappingErrorKind, reason: impl Into<String>) -> Self {
        Self {
            row: row.clone(),
            kind,
            reason: reason.into(),
        }
    }

    /// Create a MissingField error for a column
    pub fn missing_field(row: &RowId, column: &str) -> Self {
        Self::new(
            row,
            MappingErrorKind::MissingField,
            format!("column '{}' is missing or null", column),
        )
    }

    /// Create an InvalidType error for a column
    pub fn invalid_type(row: &RowId, column: &str, detail: impl fmt::Display) -> Self {
        Self::new(
            row,
            MappingErrorKind::InvalidType,
            format!("column '{}': {}", column, detail),
        )
    }

    /// Create an InvalidJsonStructure error
    pub fn invalid_json(row: &RowId, detail: impl fmt::Display) -> Self {
        Self::new(row, MappingErrorKind::InvalidJsonStructure, detail.to_string())
    }

    /// Failure code for reporting
    #[inline]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
