//! Batch sender with retry and partial-failure handling
//!
//! The sender is the only component that retries. Per attempt it sends the
//! hits that are still pending and folds the collector's per-item statuses
//! into terminal outcomes:
//!
//! - `Accepted` hits are final and never resent
//! - `Rejected` hits fail on the spot, without retry
//! - `Throttled` and `Transient` hits stay pending for the next attempt
//!
//! Once part of a batch has been accepted, the failed subset gets at most
//! `partial_retry_attempts` resends. Every batch gets at most
//! `max_attempts` collector calls; hits still pending after that fail with
//! `retries_exhausted`.
//!
//! Cancellation is only observed while waiting between attempts. Hits that
//! are pending at that point stay `Unresolved`, and the caller must not
//! commit the batch.

use std::sync::Arc;
use std::time::Duration;

use ferry_protocol::{Batch, Hit, HitOutcome, ItemStatus, SendResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::metrics::SenderMetrics;
use crate::retry::RetryPolicy;

/// Failure code for hits whose retry budget ran out
pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";

pub struct Sender {
    collector: Arc<dyn Collector>,
    policy: RetryPolicy,
    metrics: Arc<SenderMetrics>,
}

impl Sender {
    pub fn new(collector: Arc<dyn Collector>, policy: RetryPolicy) -> Self {
        Self {
            collector,
            policy,
            metrics: Arc::new(SenderMetrics::new()),
        }
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<SenderMetrics> {
        &self.metrics
    }

    #[inline]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a batch until every hit is terminal, the budget runs out, or
    /// `cancel` fires during a backoff wait
    pub async fn send(&self, batch: &Batch, cancel: &CancellationToken) -> SendResult {
        if batch.is_empty() {
            return SendResult::empty();
        }

        let mut outcomes = vec![HitOutcome::Unresolved; batch.len()];
        let mut pending: Vec<usize> = (0..batch.len()).collect();
        let mut attempts = 0u32;
        let mut throttled = 0u32;
        let mut subset_resends = 0u32;
        let mut last_reason = String::new();

        self.metrics.record_batch();

        loop {
            let subset: Vec<Hit>;
            let hits = if pending.len() == batch.len() {
                batch.hits()
            } else {
                subset = batch.subset(&pending);
                &subset
            };

            attempts += 1;
            self.metrics.record_attempt();
            if attempts > 1 {
                self.metrics.record_retry();
            }

            let statuses = self.attempt(hits).await;

            let mut still_pending = Vec::new();
            let mut retry_after: Option<Duration> = None;
            let mut was_throttled = false;

            for (&index, status) in pending.iter().zip(statuses) {
                match status {
                    ItemStatus::Accepted => outcomes[index] = HitOutcome::Accepted,
                    ItemStatus::Rejected(code) => outcomes[index] = HitOutcome::Failed { code },
                    ItemStatus::Throttled { retry_after: hint } => {
                        was_throttled = true;
                        retry_after = retry_after.max(hint);
                        last_reason = "throttled".to_string();
                        still_pending.push(index);
                    }
                    ItemStatus::Transient(reason) => {
                        last_reason = reason;
                        still_pending.push(index);
                    }
                }
            }

            if was_throttled {
                throttled += 1;
                self.metrics.record_throttled();
            }
            pending = still_pending;
            if pending.is_empty() {
                break;
            }

            let partial = outcomes.iter().any(|o| matches!(o, HitOutcome::Accepted));
            let exhausted = attempts >= self.policy.max_attempts
                || (partial && subset_resends >= self.policy.partial_retry_attempts);
            if exhausted {
                warn!(
                    batch = batch.seq(),
                    attempts,
                    pending = pending.len(),
                    last_error = %last_reason,
                    "retries exhausted"
                );
                for &index in &pending {
                    outcomes[index] = HitOutcome::Failed {
                        code: RETRIES_EXHAUSTED.to_string(),
                    };
                }
                break;
            }
            if partial {
                subset_resends += 1;
            }

            let delay = self.policy.delay(attempts, retry_after);
            debug!(
                batch = batch.seq(),
                attempt = attempts,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                last_error = %last_reason,
                "retrying after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(
                        batch = batch.seq(),
                        pending = pending.len(),
                        "send cancelled during backoff"
                    );
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let result = SendResult::from_outcomes(outcomes, attempts, throttled);
        self.metrics.record_outcomes(
            result.accepted() as u64,
            result.failed() as u64,
            result.unresolved() as u64,
        );
        debug!(
            batch = batch.seq(),
            status = ?result.status,
            accepted = result.accepted(),
            failed = result.failed(),
            attempts,
            "batch resolved"
        );
        result
    }

    /// One collector call, widened to one status per hit
    async fn attempt(&self, hits: &[Hit]) -> Vec<ItemStatus> {
        match self.collector.collect(hits).await {
            Ok(statuses) if statuses.len() == hits.len() => statuses,
            Ok(statuses) => {
                warn!(
                    collector = self.collector.name(),
                    expected = hits.len(),
                    got = statuses.len(),
                    "collector returned misaligned statuses"
                );
                vec![ItemStatus::Transient("misaligned collector response".into()); hits.len()]
            }
            Err(e) => {
                debug!(collector = self.collector.name(), error = %e, "collector call failed");
                vec![e.to_item_status(); hits.len()]
            }
        }
    }
}

#[cfg(test)]
#[path = "sender_test.rs"]
mod tests;
