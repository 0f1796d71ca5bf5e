//! Sender metrics
//!
//! Lock-free counters shared between the sender and whoever reports on it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one sender
#[derive(Debug, Default)]
pub struct SenderMetrics {
    batches_sent: AtomicU64,
    hits_accepted: AtomicU64,
    hits_failed: AtomicU64,
    hits_unresolved: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    throttled: AtomicU64,
}

impl SenderMetrics {
    pub const fn new() -> Self {
        Self {
            batches_sent: AtomicU64::new(0),
            hits_accepted: AtomicU64::new(0),
            hits_failed: AtomicU64::new(0),
            hits_unresolved: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_batch(&self) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_outcomes(&self, accepted: u64, failed: u64, unresolved: u64) {
        self.hits_accepted.fetch_add(accepted, Ordering::Relaxed);
        self.hits_failed.fetch_add(failed, Ordering::Relaxed);
        self.hits_unresolved.fetch_add(unresolved, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SenderSnapshot {
        SenderSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            hits_accepted: self.hits_accepted.load(Ordering::Relaxed),
            hits_failed: self.hits_failed.load(Ordering::Relaxed),
            hits_unresolved: self.hits_unresolved.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SenderMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderSnapshot {
    pub batches_sent: u64,
    pub hits_accepted: u64,
    pub hits_failed: u64,
    pub hits_unresolved: u64,
    pub attempts: u64,
    pub retries: u64,
    pub throttled: u64,
}
