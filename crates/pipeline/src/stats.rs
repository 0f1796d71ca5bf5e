//! Run statistics
//!
//! Counters are plain integers owned by the runner halves; the failure
//! list is shared between them and bounded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ferry_protocol::{Cursor, FailureRecord, RowId, RunState, RunSummary, SendResult};
use parking_lot::Mutex;

/// Bounded list of failure records
#[derive(Debug)]
pub struct FailureLog {
    inner: Mutex<FailureInner>,
}

#[derive(Debug)]
struct FailureInner {
    records: Vec<FailureRecord>,
    truncated: u64,
    limit: usize,
}

impl FailureLog {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(FailureInner {
                records: Vec::new(),
                truncated: 0,
                limit,
            }),
        })
    }

    pub fn record(&self, row: RowId, code: impl Into<String>, detail: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.records.len() < inner.limit {
            inner.records.push(FailureRecord {
                row,
                code: code.into(),
                detail: detail.into(),
            });
        } else {
            inner.truncated += 1;
        }
    }

    /// Records kept and the number dropped past the limit
    pub fn take(&self) -> (Vec<FailureRecord>, u64) {
        let mut inner = self.inner.lock();
        (
            std::mem::take(&mut inner.records),
            std::mem::take(&mut inner.truncated),
        )
    }
}

/// Counters kept while preparing batches
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadStats {
    pub rows_read: u64,
    /// Malformed, invalid, or oversized rows
    pub hits_skipped: u64,
    pub hits_duplicate: u64,
}

/// Counters kept while delivering batches
#[derive(Debug, Default, Clone, Copy)]
pub struct DeliveryStats {
    pub hits_sent: u64,
    pub hits_failed: u64,
    pub batches_sent: u64,
    pub batches_committed: u64,
    pub retries: u64,
}

impl DeliveryStats {
    /// Count a send result
    pub fn record(&mut self, result: &SendResult) {
        if result.attempts > 0 {
            self.batches_sent += 1;
        }
        self.hits_sent += result.accepted() as u64;
        self.hits_failed += result.failed() as u64;
        self.retries += result.retries() as u64;
    }
}

/// Everything needed to finalize a summary
pub struct SummaryParts {
    pub pipeline: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub read: ReadStats,
    pub delivery: DeliveryStats,
    pub resumed_from: Option<Cursor>,
    pub final_cursor: Option<Cursor>,
    pub abort_reason: Option<String>,
}

impl SummaryParts {
    pub fn finish(self, failures: &FailureLog) -> RunSummary {
        let (failures, failures_truncated) = failures.take();
        RunSummary {
            pipeline: self.pipeline,
            state: self.state,
            started_at: self.started_at,
            finished_at: Utc::now(),
            rows_read: self.read.rows_read,
            hits_sent: self.delivery.hits_sent,
            hits_failed: self.delivery.hits_failed,
            hits_skipped: self.read.hits_skipped,
            hits_duplicate: self.read.hits_duplicate,
            batches_sent: self.delivery.batches_sent,
            batches_committed: self.delivery.batches_committed,
            retries: self.delivery.retries,
            resumed_from: self.resumed_from,
            final_cursor: self.final_cursor,
            abort_reason: self.abort_reason,
            failures,
            failures_truncated,
        }
    }
}
