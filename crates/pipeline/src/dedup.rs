//! Bounded in-run duplicate detection

use std::collections::{HashSet, VecDeque};

use ferry_protocol::DedupKey;

/// The most recent `capacity` dedup keys seen this run
///
/// Once full, the oldest key is forgotten, so a repeat further back than
/// the window is sent again. Memory stays proportional to the window, not
/// to the run.
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    keys: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            keys: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Remember `key`; false when it is already in the window
    pub fn insert(&mut self, key: &DedupKey) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.keys.remove(&oldest);
        }
        self.keys.insert(key.clone());
        self.order.push_back(key.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
