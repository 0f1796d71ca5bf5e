//! Raw rows read from a source

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::value::Value;

/// Source-relative identifier of a row
///
/// Stable across re-reads of the same source, which is what makes the
/// dedup key stable across retries and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowId {
    /// Position in an ordered result (0-based)
    Offset { index: u64 },

    /// Line in a file object (1-based)
    Line { object: String, line: u64 },

    /// Primary key value
    Key { key: String },
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset { index } => write!(f, "row#{}", index),
            Self::Line { object, line } => write!(f, "{}:{}", object, line),
            Self::Key { key } => write!(f, "key={}", key),
        }
    }
}

/// One event row as read from the source
///
/// Columns keep source order. `position` is the cursor *after* this row,
/// i.e. committing it means this row is done.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    id: RowId,
    position: Cursor,
    columns: Vec<(String, Value)>,
}

impl RawRow {
    /// Create a row from its identifier, following position and columns
    pub fn new(id: RowId, position: Cursor, columns: Vec<(String, Value)>) -> Self {
        Self {
            id,
            position,
            columns,
        }
    }

    #[inline]
    pub fn id(&self) -> &RowId {
        &self.id
    }

    /// Cursor that marks this row as consumed
    #[inline]
    pub fn position(&self) -> &Cursor {
        &self.position
    }

    /// Look up a column by name (first match wins)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate columns in source order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
