//! Send outcomes
//!
//! Collectors report per-item status; the sender folds those into one
//! terminal `HitOutcome` per hit and a `SendResult` per batch.

use std::time::Duration;

use serde::Serialize;

/// Status of one item as reported by a collector for a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Collector took the item
    Accepted,

    /// Collector refused the item permanently (malformed, auth, quota)
    Rejected(String),

    /// Collector asked us to slow down
    Throttled { retry_after: Option<Duration> },

    /// Network or server failure; the item may succeed if resent
    Transient(String),
}

impl ItemStatus {
    /// Whether the item may be resent
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Transient(_))
    }
}

/// Final outcome of one hit after the sender is done with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HitOutcome {
    /// Confirmed sent
    Accepted,

    /// Permanently failed (rejected, or retries exhausted)
    Failed { code: String },

    /// Sending was cut off by cancellation before a terminal outcome
    Unresolved,
}

impl HitOutcome {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unresolved)
    }
}

/// Batch-wide status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every hit accepted
    Accepted,
    /// No hit accepted
    Rejected,
    /// Some hits accepted, others not
    Partial,
}

/// Outcome of sending one batch
///
/// `outcomes` is aligned by index with the batch's hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub status: BatchStatus,
    pub outcomes: Vec<HitOutcome>,
    /// Collector calls made, including the first
    pub attempts: u32,
    /// Attempts where at least one item was throttled
    pub throttled: u32,
}

impl SendResult {
    /// Build a result, deriving the batch status from the outcomes
    pub fn from_outcomes(outcomes: Vec<HitOutcome>, attempts: u32, throttled: u32) -> Self {
        let accepted = outcomes
            .iter()
            .filter(|o| matches!(o, HitOutcome::Accepted))
            .count();
        let status = if accepted == outcomes.len() {
            BatchStatus::Accepted
        } else if accepted == 0 {
            BatchStatus::Rejected
        } else {
            BatchStatus::Partial
        };

        Self {
            status,
            outcomes,
            attempts,
            throttled,
        }
    }

    /// Result for a batch that carried no hits
    pub fn empty() -> Self {
        Self::from_outcomes(Vec::new(), 0, 0)
    }

    /// Retries performed after the first attempt
    #[inline]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn accepted(&self) -> usize {
        self.count(|o| matches!(o, HitOutcome::Accepted))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, HitOutcome::Failed { .. }))
    }

    pub fn unresolved(&self) -> usize {
        self.count(|o| matches!(o, HitOutcome::Unresolved))
    }

    /// Every hit reached accepted or permanently failed
    pub fn is_terminal(&self) -> bool {
        self.outcomes.iter().all(HitOutcome::is_terminal)
    }

    fn count(&self, pred: impl Fn(&HitOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}
