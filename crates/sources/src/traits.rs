//! RowSource trait definition

use async_trait::async_trait;
use ferry_protocol::{Cursor, RawRow};

use crate::error::{Result, SourceError};

/// Rows returned by one read
#[derive(Debug, Default)]
pub struct ReadBatch {
    /// Rows in source order; malformed rows appear in place as errors
    pub records: Vec<std::result::Result<RawRow, SourceError>>,

    /// Cursor after the last record (input cursor when nothing was read)
    pub cursor: Cursor,

    /// No rows remain after `cursor`
    pub exhausted: bool,
}

impl ReadBatch {
    /// Number of records, malformed ones included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A restartable reader of event rows
///
/// Implementations must resume from any cursor they previously returned:
/// reading again from that cursor yields the same rows with the same ids.
#[async_trait]
pub trait RowSource: Send {
    /// Short description for logs (e.g., "gs://bucket/prefix")
    fn describe(&self) -> String;

    /// Connect, check the schema, and return the cursor to read from
    ///
    /// `resume` is the last committed cursor, if any.
    async fn open(&mut self, resume: Option<Cursor>) -> Result<Cursor>;

    /// Read up to `max_rows` records after `cursor`
    async fn next_batch(&mut self, cursor: &Cursor, max_rows: usize) -> Result<ReadBatch>;
}

/// Columns from `expected` that `available` lacks
pub(crate) fn missing_columns<'a, I>(expected: &[String], available: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    expected
        .iter()
        .filter(|column| !available.clone().into_iter().any(|c| c == column.as_str()))
        .cloned()
        .collect()
}
