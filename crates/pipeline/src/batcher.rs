//! Batcher - greedy packing of hits into bounded batches
//!
//! Hits are appended in arrival order. A batch closes when the next hit
//! would push it past the byte limit, or as soon as it holds `max_hits`.
//! A hit is never split across batches.
//!
//! The batcher also follows the source position. Rows that produce no hit
//! (malformed, invalid, duplicate, oversized) move the position forward
//! through [`Batcher::note_skipped`], so the batch that closes next commits
//! past them too.

use ferry_config::BatchConfig;
use ferry_protocol::payload::encoded_len;
use ferry_protocol::{Batch, Cursor, Hit, PayloadType};

/// A hit that can never fit in a batch
#[derive(Debug)]
pub struct Oversize {
    pub hit: Box<Hit>,
    /// Serialized size of the hit
    pub size: usize,
    pub limit: usize,
}

/// Greedy batch builder
#[derive(Debug)]
pub struct Batcher {
    max_hits: usize,
    max_bytes: usize,
    payload_type: PayloadType,

    /// Sequence number of the next batch
    next_seq: u64,
    hits: Vec<Hit>,
    bytes: usize,
    skipped: u64,
    /// Position covered by the open batch
    position: Option<Cursor>,
    /// Commit cursor of the last closed batch
    last_closed: Option<Cursor>,
}

impl Batcher {
    pub fn new(config: &BatchConfig, payload_type: PayloadType) -> Self {
        Self {
            max_hits: config.max_hits.max(1),
            max_bytes: config.max_bytes,
            payload_type,
            next_seq: 0,
            hits: Vec::new(),
            bytes: 0,
            skipped: 0,
            position: None,
            last_closed: None,
        }
    }

    /// Add a hit, returning the batch it closed (if any)
    ///
    /// The returned batch never contains `hit` unless `hit` filled it to
    /// `max_hits`.
    pub fn add(&mut self, hit: Hit) -> Result<Option<Batch>, Oversize> {
        let size = encoded_len(self.payload_type, &hit);
        if size > self.max_bytes {
            return Err(Oversize {
                hit: Box::new(hit),
                size,
                limit: self.max_bytes,
            });
        }

        let closed = if !self.hits.is_empty() && self.bytes + size > self.max_bytes {
            self.close()
        } else {
            None
        };

        self.position = Some(hit.position.clone());
        self.bytes += size;
        self.hits.push(hit);

        // A byte-limit close leaves one hit open, which fills the batch only
        // when max_hits is 1, and then nothing was open to close.
        if self.hits.len() >= self.max_hits {
            return Ok(self.close());
        }
        Ok(closed)
    }

    /// Record a row that produced no hit
    pub fn note_skipped(&mut self, position: Cursor) {
        self.skipped += 1;
        self.position = Some(position);
    }

    /// Move the position without a row (e.g. past blank lines)
    pub fn advance(&mut self, position: Cursor) {
        if self.position.is_none() && self.last_closed.as_ref() == Some(&position) {
            return;
        }
        self.position = Some(position);
    }

    /// Close the open batch at end of input
    ///
    /// Returns a hit-less batch when only skipped rows are pending, so their
    /// position still gets committed.
    pub fn finish(&mut self) -> Option<Batch> {
        self.close()
    }

    /// Hits in the open batch
    #[inline]
    pub fn pending(&self) -> usize {
        self.hits.len()
    }

    fn close(&mut self) -> Option<Batch> {
        let position = self.position.take()?;
        self.last_closed = Some(position.clone());
        let batch = Batch::new(
            self.next_seq,
            std::mem::take(&mut self.hits),
            std::mem::take(&mut self.bytes),
            position,
            std::mem::take(&mut self.skipped),
        );
        self.next_seq += 1;
        Some(batch)
    }
}

#[cfg(test)]
#[path = "batcher_test.rs"]
mod tests;
