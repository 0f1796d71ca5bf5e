//! In-memory row source
//!
//! Serves a fixed list of rows addressed by offset. Used for tests and for
//! replaying rows that were already materialized elsewhere.

use std::collections::HashSet;

use async_trait::async_trait;
use ferry_protocol::{Cursor, RawRow, RowId, Value};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::traits::{ReadBatch, RowSource, missing_columns};

/// One stored row, possibly unparsable
#[derive(Debug, Clone)]
enum Entry {
    Row(Vec<(String, Value)>),
    Malformed(String),
}

/// Row source over rows held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<Entry>,
    expected: Vec<String>,
    /// Read calls (0-based) that fail with `Unavailable`
    failing_reads: HashSet<usize>,
    reads: usize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row
    pub fn push_row<K: Into<String>>(&mut self, columns: Vec<(K, Value)>) {
        self.entries.push(Entry::Row(
            columns.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ));
    }

    /// Builder form of `push_row`
    pub fn with_row<K: Into<String>>(mut self, columns: Vec<(K, Value)>) -> Self {
        self.push_row(columns);
        self
    }

    /// Append a row that fails to parse
    pub fn with_malformed(mut self, reason: impl Into<String>) -> Self {
        self.entries.push(Entry::Malformed(reason.into()));
        self
    }

    /// Columns every row must carry; checked against the first row on open
    pub fn with_expected_columns(mut self, columns: Vec<String>) -> Self {
        self.expected = columns;
        self
    }

    /// Make the `n`th read (0-based) fail as unavailable
    pub fn fail_on_read(mut self, n: usize) -> Self {
        self.failing_reads.insert(n);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RowSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} rows)", self.entries.len())
    }

    async fn open(&mut self, resume: Option<Cursor>) -> Result<Cursor> {
        let first = self.entries.iter().find_map(|e| match e {
            Entry::Row(columns) => Some(columns),
            Entry::Malformed(_) => None,
        });
        if let Some(columns) = first {
            let missing =
                missing_columns(&self.expected, columns.iter().map(|(name, _)| name.as_str()));
            if !missing.is_empty() {
                return Err(SourceError::SchemaMismatch {
                    location: "memory".into(),
                    missing,
                });
            }
        }

        match resume {
            None => Ok(Cursor::Start),
            Some(cursor @ (Cursor::Start | Cursor::Offset { .. })) => Ok(cursor),
            Some(other) => Err(SourceError::IncompatibleCursor(other)),
        }
    }

    async fn next_batch(&mut self, cursor: &Cursor, max_rows: usize) -> Result<ReadBatch> {
        let read = self.reads;
        self.reads += 1;
        if self.failing_reads.contains(&read) {
            return Err(SourceError::unavailable(format!("read {} failed", read)));
        }

        let start = match cursor {
            Cursor::Start => 0,
            Cursor::Offset { rows } => *rows as usize,
            other => return Err(SourceError::IncompatibleCursor(other.clone())),
        };
        let end = (start + max_rows).min(self.entries.len());

        let records = (start..end)
            .map(|index| {
                let row = RowId::Offset {
                    index: index as u64,
                };
                let position = Cursor::Offset {
                    rows: index as u64 + 1,
                };
                match &self.entries[index] {
                    Entry::Row(columns) => Ok(RawRow::new(row, position, columns.clone())),
                    Entry::Malformed(reason) => Err(SourceError::MalformedRecord {
                        row,
                        position,
                        reason: reason.clone(),
                    }),
                }
            })
            .collect::<Vec<_>>();

        debug!(start, rows = records.len(), "memory source read");

        let cursor = if end > start {
            Cursor::Offset { rows: end as u64 }
        } else {
            cursor.clone()
        };
        Ok(ReadBatch {
            records,
            cursor,
            exhausted: end >= self.entries.len(),
        })
    }
}
