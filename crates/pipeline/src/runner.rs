//! PipelineRunner - drives one run from source to committed cursor
//!
//! # States
//!
//! ```text
//! Idle ─> Loading ─> Mapping ─> Batching ─> Sending ─> Committing ─> Loading ...
//!                                                                  └─> Drained
//! any ─> Aborted (source failure, commit failure, failure threshold, cancel)
//! ```
//!
//! # Pipelining
//!
//! With `pipelining` on, the next batch is prepared (read, map, batch)
//! while the current one is being sent. Delivery stays sequential, so
//! batch N is always committed before batch N+1.
//!
//! A run never returns an error: whatever happens, the caller gets a
//! `RunSummary` with the counts reached so far.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use ferry_config::Config;
use ferry_protocol::{Batch, BatchStatus, Cursor, HitOutcome, RawRow, RunState, RunSummary};
use ferry_sinks::Sender;
use ferry_sources::{RowSource, SourceError};
use ferry_transform::EventMapper;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::batcher::Batcher;
use crate::dedup::DedupWindow;
use crate::error::{PipelineError, Result};
use crate::progress::{ProgressStore, ProgressTracker};
use crate::stats::{DeliveryStats, FailureLog, ReadStats, SummaryParts};

/// Failure code for rows the source could not parse
pub const MALFORMED_RECORD: &str = "malformed_record";

/// Failure code for hits larger than a whole batch
pub const HIT_TOO_LARGE: &str = "hit_too_large";

/// Shared, observable run state
struct Phase {
    tx: watch::Sender<RunState>,
}

impl Phase {
    fn set(&self, next: RunState) {
        let prev = self.tx.send_replace(next);
        if prev != next {
            trace!(from = %prev, to = %next, "state transition");
        }
    }
}

/// Read side: source, mapper, batcher
struct Producer {
    source: Box<dyn RowSource>,
    mapper: EventMapper,
    batcher: Batcher,
    read_rows: usize,
    cursor: Cursor,
    exhausted: bool,
    ready: VecDeque<Batch>,
    /// Recent dedup keys handed to the batcher
    seen: DedupWindow,
    stats: ReadStats,
    failures: Arc<FailureLog>,
    phase: Arc<Phase>,
}

impl Producer {
    /// Next closed batch, or `None` once the source is drained
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        loop {
            if let Some(batch) = self.ready.pop_front() {
                self.phase.set(RunState::Batching);
                return Ok(Some(batch));
            }
            if self.exhausted {
                return Ok(self.batcher.finish());
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        self.phase.set(RunState::Loading);
        let read = self.source.next_batch(&self.cursor, self.read_rows).await?;
        debug!(
            rows = read.len(),
            cursor = %read.cursor,
            exhausted = read.exhausted,
            "source read"
        );

        self.phase.set(RunState::Mapping);
        for record in read.records {
            self.accept(record)?;
        }

        self.batcher.advance(read.cursor.clone());
        self.cursor = read.cursor;
        self.exhausted = read.exhausted;
        Ok(())
    }

    fn accept(&mut self, record: std::result::Result<RawRow, SourceError>) -> Result<()> {
        let row = match record {
            Ok(row) => row,
            Err(SourceError::MalformedRecord {
                row,
                position,
                reason,
            }) => {
                self.stats.rows_read += 1;
                self.stats.hits_skipped += 1;
                debug!(row = %row, reason = %reason, "skipping malformed record");
                self.failures.record(row, MALFORMED_RECORD, reason);
                self.batcher.note_skipped(position);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.stats.rows_read += 1;

        let hit = match self.mapper.map(&row) {
            Ok(hit) => hit,
            Err(e) => {
                self.stats.hits_skipped += 1;
                debug!(error = %e, "skipping row that failed mapping");
                self.failures.record(e.row.clone(), e.code(), e.reason);
                self.batcher.note_skipped(row.position().clone());
                return Ok(());
            }
        };

        if !self.seen.insert(&hit.dedup_key) {
            self.stats.hits_duplicate += 1;
            debug!(row = %hit.row_id, dedup_key = %hit.dedup_key, "dropping duplicate hit");
            self.batcher.note_skipped(hit.position);
            return Ok(());
        }

        match self.batcher.add(hit) {
            Ok(Some(batch)) => self.ready.push_back(batch),
            Ok(None) => {}
            Err(oversize) => {
                self.stats.hits_skipped += 1;
                warn!(
                    row = %oversize.hit.row_id,
                    size = oversize.size,
                    limit = oversize.limit,
                    "hit exceeds batch byte limit"
                );
                self.failures.record(
                    oversize.hit.row_id.clone(),
                    HIT_TOO_LARGE,
                    format!("{} bytes exceeds limit of {}", oversize.size, oversize.limit),
                );
                self.batcher.note_skipped(oversize.hit.position);
            }
        }
        Ok(())
    }
}

/// Delivery side: sender and cursor commits
struct Consumer {
    sender: Sender,
    tracker: ProgressTracker,
    stats: DeliveryStats,
    /// 0 disables
    fatal_threshold: u32,
    consecutive_failures: u32,
    failures: Arc<FailureLog>,
    phase: Arc<Phase>,
}

impl Consumer {
    async fn deliver(&mut self, batch: Batch, cancel: &CancellationToken) -> Result<()> {
        self.phase.set(RunState::Sending);
        let result = self.sender.send(&batch, cancel).await;
        self.stats.record(&result);

        for (hit, outcome) in batch.hits().iter().zip(&result.outcomes) {
            if let HitOutcome::Failed { code } = outcome {
                self.failures.record(
                    hit.row_id.clone(),
                    code.clone(),
                    format!("event '{}' was not accepted", hit.event_name),
                );
            }
        }

        if !result.is_terminal() {
            info!(
                batch = batch.seq(),
                unresolved = result.unresolved(),
                "batch cut off by cancellation, not committed"
            );
            return Err(PipelineError::Cancelled);
        }

        self.phase.set(RunState::Committing);
        self.tracker
            .commit(batch.commit_cursor())
            .map_err(PipelineError::CommitFailure)?;
        self.stats.batches_committed += 1;

        info!(
            batch = batch.seq(),
            hits = batch.len(),
            accepted = result.accepted(),
            failed = result.failed(),
            skipped = batch.skipped_rows(),
            retries = result.retries(),
            cursor = %batch.commit_cursor(),
            "batch committed"
        );

        if batch.is_empty() {
            return Ok(());
        }
        if result.status == BatchStatus::Rejected {
            self.consecutive_failures += 1;
            if self.fatal_threshold > 0 && self.consecutive_failures >= self.fatal_threshold {
                return Err(PipelineError::FailureThreshold {
                    batches: self.consecutive_failures,
                });
            }
        } else {
            self.consecutive_failures = 0;
        }
        Ok(())
    }
}

/// Drives source → mapper → batcher → sender → progress for one run
pub struct PipelineRunner {
    name: String,
    producer: Producer,
    consumer: Consumer,
    pipelining: bool,
    phase: Arc<Phase>,
    failures: Arc<FailureLog>,
}

impl PipelineRunner {
    pub fn new(
        config: &Config,
        source: Box<dyn RowSource>,
        sender: Sender,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        let name = config.pipeline.name.clone();
        let failures = FailureLog::new(config.pipeline.max_failure_records);
        let (tx, _) = watch::channel(RunState::Idle);
        let phase = Arc::new(Phase { tx });

        let producer = Producer {
            source,
            mapper: EventMapper::new(config.schema.clone()),
            batcher: Batcher::new(&config.batch, config.sink.payload_type),
            read_rows: config.pipeline.read_batch_rows.max(1),
            cursor: Cursor::Start,
            exhausted: false,
            ready: VecDeque::new(),
            seen: DedupWindow::new(config.pipeline.dedup_window),
            stats: ReadStats::default(),
            failures: failures.clone(),
            phase: phase.clone(),
        };
        let consumer = Consumer {
            sender,
            tracker: ProgressTracker::new(store, name.clone()),
            stats: DeliveryStats::default(),
            fatal_threshold: config.pipeline.fatal_failure_threshold,
            consecutive_failures: 0,
            failures: failures.clone(),
            phase: phase.clone(),
        };

        Self {
            name,
            producer,
            consumer,
            pipelining: config.pipeline.pipelining,
            phase,
            failures,
        }
    }

    /// Watch the run state from outside the run
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.phase.tx.subscribe()
    }

    /// Run to completion, abort, or cancellation
    pub async fn run(mut self, cancel: CancellationToken) -> RunSummary {
        let started_at = Utc::now();
        info!(
            pipeline = %self.name,
            source = %self.producer.source.describe(),
            pipelining = self.pipelining,
            "pipeline run starting"
        );

        let mut resumed_from = None;
        let outcome = self.execute(&cancel, &mut resumed_from).await;

        let (state, abort_reason) = match outcome {
            Ok(()) => (RunState::Drained, None),
            Err(PipelineError::Cancelled) => {
                info!(pipeline = %self.name, "run cancelled");
                (RunState::Aborted, Some(PipelineError::Cancelled.to_string()))
            }
            Err(e) => {
                warn!(pipeline = %self.name, error = %e, "run aborted");
                (RunState::Aborted, Some(e.to_string()))
            }
        };
        self.phase.set(state);

        let summary = SummaryParts {
            pipeline: self.name,
            state,
            started_at,
            read: self.producer.stats,
            delivery: self.consumer.stats,
            resumed_from,
            final_cursor: self.consumer.tracker.committed().cloned(),
            abort_reason,
        }
        .finish(&self.failures);

        let sender = self.consumer.sender.metrics().snapshot();
        info!(
            pipeline = %summary.pipeline,
            state = %summary.state,
            rows_read = summary.rows_read,
            hits_sent = summary.hits_sent,
            hits_failed = summary.hits_failed,
            hits_skipped = summary.hits_skipped,
            hits_duplicate = summary.hits_duplicate,
            batches_committed = summary.batches_committed,
            attempts = sender.attempts,
            throttled = sender.throttled,
            "pipeline run finished"
        );
        summary
    }

    async fn execute(
        &mut self,
        cancel: &CancellationToken,
        resumed_from: &mut Option<Cursor>,
    ) -> Result<()> {
        self.phase.set(RunState::Loading);
        let committed = self
            .consumer
            .tracker
            .load()
            .map_err(PipelineError::LoadFailure)?;
        resumed_from.clone_from(&committed);

        self.producer.cursor = self.producer.source.open(committed).await?;

        let mut next = self.producer.next_batch().await?;
        while let Some(batch) = next {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            if self.pipelining {
                let (delivered, prepared) = tokio::join!(
                    self.consumer.deliver(batch, cancel),
                    self.producer.next_batch()
                );
                delivered?;
                next = prepared?;
            } else {
                self.consumer.deliver(batch, cancel).await?;
                next = self.producer.next_batch().await?;
            }
        }
        Ok(())
    }
}
