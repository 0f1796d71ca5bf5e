//! Run-level accounting

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cursor::Cursor;
use crate::row::RowId;

/// Pipeline runner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Loading,
    Mapping,
    Batching,
    Sending,
    Committing,
    /// Source exhausted and every batch resolved
    Drained,
    /// Stopped by a fatal error or cancellation
    Aborted,
}

impl RunState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Drained | Self::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Mapping => "mapping",
            Self::Batching => "batching",
            Self::Sending => "sending",
            Self::Committing => "committing",
            Self::Drained => "drained",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row or hit that did not make it to the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub row: RowId,
    /// Short machine-readable reason (e.g. `missing_required_field`)
    pub code: String,
    /// Human-readable detail
    pub detail: String,
}

/// Aggregate result of one pipeline execution
///
/// Produced once when the run ends, whether it drained or aborted.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Pipeline configuration identity
    pub pipeline: String,
    /// Terminal state
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub rows_read: u64,
    pub hits_sent: u64,
    pub hits_failed: u64,
    /// Rows dropped as malformed or failing validation
    pub hits_skipped: u64,
    /// Hits dropped because their dedup key was already seen this run
    pub hits_duplicate: u64,
    /// Batches that reached the collector
    pub batches_sent: u64,
    /// Batches whose cursor was committed
    pub batches_committed: u64,
    /// Collector re-send attempts across all batches
    pub retries: u64,

    /// Cursor the run started from
    pub resumed_from: Option<Cursor>,
    /// Last committed cursor
    pub final_cursor: Option<Cursor>,

    /// Why the run aborted
    pub abort_reason: Option<String>,

    /// First failures, bounded
    pub failures: Vec<FailureRecord>,
    /// Failures not listed because the list was full
    pub failures_truncated: u64,
}

impl RunSummary {
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.state == RunState::Drained
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
