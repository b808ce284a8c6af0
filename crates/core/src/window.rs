//! Short-term rolling window.
//!
//! A fixed-capacity sequence of recent conversational entries. Appending
//! past capacity evicts the oldest entry. Never persisted.

use std::collections::VecDeque;

use crate::message::RollingMessage;

/// Oldest-evicted-first window of recent messages.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    entries: VecDeque<RollingMessage>,
}

impl RollingWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&mut self, message: RollingMessage) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RollingMessage> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&RollingMessage> {
        self.entries.back()
    }

    /// Owned copy of the entries in arrival order (for background synthesis).
    pub fn snapshot(&self) -> Vec<RollingMessage> {
        self.entries.iter().cloned().collect()
    }
}
