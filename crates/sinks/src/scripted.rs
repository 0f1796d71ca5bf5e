//! Scripted collector
//!
//! An in-memory collector that replays queued replies and records every
//! hit it was handed. Used as a stand-in for the remote endpoint in tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use ferry_protocol::{DedupKey, Hit, ItemStatus};
use parking_lot::Mutex;

use crate::collector::Collector;
use crate::error::{Result, SendError};

/// One queued reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Same status for every hit of the call
    All(ItemStatus),
    /// Status per hit; missing entries are accepted
    PerItem(Vec<ItemStatus>),
    /// Whole-call failure
    Fail(SendError),
}

/// Replays queued replies; accepts everything once the queue is empty
#[derive(Debug, Default)]
pub struct ScriptedCollector {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<DedupKey>>>,
    accepted: Mutex<Vec<DedupKey>>,
    latency: Option<Duration>,
}

impl ScriptedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply
    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Queue the same reply `n` times
    pub fn then_times(self, n: usize, reply: Reply) -> Self {
        self.script
            .lock()
            .extend(std::iter::repeat_n(reply, n));
        self
    }

    /// Wait this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Dedup keys handed to each call, in call order
    pub fn calls(&self) -> Vec<Vec<DedupKey>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Keys of every hit reported accepted, including repeats
    pub fn accepted(&self) -> Vec<DedupKey> {
        self.accepted.lock().clone()
    }
}

#[async_trait]
impl Collector for ScriptedCollector {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn collect(&self, hits: &[Hit]) -> Result<Vec<ItemStatus>> {
        self.calls
            .lock()
            .push(hits.iter().map(|h| h.dedup_key.clone()).collect());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self.script.lock().pop_front();
        let statuses = match reply {
            None => vec![ItemStatus::Accepted; hits.len()],
            Some(Reply::All(status)) => vec![status; hits.len()],
            Some(Reply::PerItem(mut statuses)) => {
                statuses.resize(hits.len(), ItemStatus::Accepted);
                statuses
            }
            Some(Reply::Fail(e)) => return Err(e),
        };

        let mut accepted = self.accepted.lock();
        for (hit, status) in hits.iter().zip(&statuses) {
            if *status == ItemStatus::Accepted {
                accepted.push(hit.dedup_key.clone());
            }
        }
        Ok(statuses)
    }
}
