//! Rolling history of fund-level snapshots used for trend display.

use chrono::{DateTime, Local, SubsecRound};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub fund_change_pct: f64,
    pub real_earnings: f64,
}

/// Bounded FIFO of history entries. Holds at most `capacity` entries; the
/// oldest are dropped first. Entries are never modified after `append`.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, timestamp: DateTime<Local>, fund_change_pct: f64, real_earnings: f64) {
        self.entries.push_back(HistoryEntry {
            timestamp: timestamp.trunc_subsecs(0),
            fund_change_pct,
            real_earnings,
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Entries oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
