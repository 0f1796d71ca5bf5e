//! Batch - bounded group of hits sent together
//!
//! A batch is closed by the batcher; once closed it is immutable. Besides
//! its hits it carries the cursor that may be committed once every hit in
//! it reaches a terminal outcome.

use crate::cursor::Cursor;
use crate::hit::Hit;

/// Size-bounded, ordered group of hits
#[derive(Debug, Clone)]
pub struct Batch {
    /// Sequence number within the run (0-based)
    seq: u64,

    /// Hits in arrival order
    hits: Vec<Hit>,

    /// Serialized size of all hits, in bytes
    byte_size: usize,

    /// Cursor to commit once this batch is resolved
    commit_cursor: Cursor,

    /// Rows skipped while this batch was open (already accounted)
    skipped_rows: u64,
}

impl Batch {
    /// Create a batch
    pub fn new(
        seq: u64,
        hits: Vec<Hit>,
        byte_size: usize,
        commit_cursor: Cursor,
        skipped_rows: u64,
    ) -> Self {
        Self {
            seq,
            hits,
            byte_size,
            commit_cursor,
            skipped_rows,
        }
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// A batch with no hits only advances the cursor
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[inline]
    pub fn commit_cursor(&self) -> &Cursor {
        &self.commit_cursor
    }

    #[inline]
    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows
    }

    /// Clone the hits at `indices` into a smaller retry set, keeping order
    pub fn subset(&self, indices: &[usize]) -> Vec<Hit> {
        indices
            .iter()
            .filter_map(|&i| self.hits.get(i).cloned())
            .collect()
    }
}
