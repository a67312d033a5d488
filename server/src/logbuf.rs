//! Bounded in-memory buffer of the aggregator's own operational log
//! lines, surfaced alongside upstream logs in the errors endpoint.

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsLogEntry {
    pub level: String,
    pub message: String,
    pub time: String,
}

/// Fixed-capacity append-only ring; oldest entries are dropped first.
/// Guarded by a std mutex — writes are short and never held across an
/// await point.
pub struct OpsLogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<OpsLogEntry>>,
}

impl OpsLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, level: &str, message: impl Into<String>) {
        let entry = OpsLogEntry {
            level: level.to_string(),
            message: message.into(),
            time: Utc::now().to_rfc3339(),
        };
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<OpsLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
