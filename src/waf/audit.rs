//! Bounded in-memory record of dispatched matches.

use crate::rules::Direction;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::RwLock;

/// Default number of match records retained.
pub const AUDIT_CAPACITY: usize = 1024;

/// One dispatched match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    /// Id of the WAF that matched.
    pub waf_id: String,
    /// Direction of the walk.
    pub direction: Direction,
    /// Matched group id.
    pub group_id: String,
    /// Matched group name.
    pub group_name: String,
    /// Matched set id.
    pub set_id: String,
    /// Matched set name.
    pub set_name: String,
    /// Action name the set dispatched.
    pub action: String,
    /// Whether downstream handlers were allowed to run.
    pub go_next: bool,
}

/// Ring of recent match records, oldest evicted first.
#[derive(Debug)]
pub struct AuditLog {
    capacity: usize,
    entries: RwLock<VecDeque<MatchRecord>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(AUDIT_CAPACITY)
    }
}

impl AuditLog {
    /// Create a ring holding at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn record(&self, record: MatchRecord) {
        if let Ok(mut entries) = self.entries.write() {
            while entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(record);
        }
    }

    /// Up to `count` most recent records, newest first.
    pub fn recent(&self, count: usize) -> Vec<MatchRecord> {
        self.entries
            .read()
            .map(|entries| entries.iter().rev().take(count).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all records.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
