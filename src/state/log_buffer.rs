//! # LogBuffer: bounded activity log.
//!
//! A fixed-capacity FIFO ring of [`LogEntry`] values. Storage is kept in
//! insertion order; reads are newest-first.
//!
//! ```text
//! append(L6) with N = 5:
//!   [L1 L2 L3 L4 L5]  ──►  [L2 L3 L4 L5 L6]     (L1 evicted)
//! recent(3) ──► [L6 L5 L4]
//! ```
//!
//! Each append publishes a `log-append` event and `clear()` publishes
//! `logs-cleared`, both while the ring lock is held.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::subscribers::Broadcaster;

/// Severity of an activity-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        })
    }
}

/// Immutable activity-log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic per-buffer id, never reused (not even after `clear()`).
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
}

/// Ring storage guarded by the buffer's mutex.
pub(crate) struct Ring {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl Ring {
    /// Up to `limit` entries, newest first.
    pub(crate) fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

/// Bounded, ordered store of operational events.
pub struct LogBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
    broadcaster: Broadcaster,
}

impl LogBuffer {
    /// Creates an empty buffer holding at most `capacity` entries (min 1).
    pub fn new(capacity: usize, broadcaster: Broadcaster) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_id: 1,
            }),
            capacity,
            broadcaster,
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn append(&self, message: impl Into<String>, level: LogLevel) -> LogEntry {
        let mut ring = self.lock();
        let entry = LogEntry {
            id: ring.next_id,
            timestamp: Utc::now(),
            message: message.into(),
            level,
        };
        ring.next_id += 1;

        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(entry.clone());

        self.broadcaster.publish(Event::log_append(entry.clone()));
        entry
    }

    pub fn info(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, LogLevel::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, LogLevel::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, LogLevel::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> LogEntry {
        self.append(message, LogLevel::Error)
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.lock().recent(limit)
    }

    /// Empties the buffer and tells observers to reset their view.
    pub fn clear(&self) {
        let mut ring = self.lock();
        ring.entries.clear();
        self.broadcaster.publish(Event::logs_cleared());
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
