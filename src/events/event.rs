//! # Events pushed to observers.
//!
//! Every mutation of shared state produces exactly one [`Event`]:
//! - **status-update**: full [`StatusSnapshot`] after any registry mutation
//! - **log-append**: one new [`LogEntry`]
//! - **logs-cleared**: the activity log was emptied
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. A single subscriber receives events in publish order; `seq`
//! lets a client detect gaps after a reconnect.
//!
//! ## Wire format
//! ```text
//! {"seq": 42, "at": "...", "type": "log-append", "payload": {"id": 7, ...}}
//! {"seq": 43, "at": "...", "type": "logs-cleared"}
//! ```
//!
//! ## Example
//! ```rust
//! use servicevisor::{Event, EventKind};
//!
//! let ev = Event::logs_cleared();
//! assert!(matches!(ev.kind, EventKind::LogsCleared));
//! assert!(ev.to_json().contains("\"type\":\"logs-cleared\""));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::{LogEntry, StatusSnapshot};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pushed events, with their payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum EventKind {
    /// Registry changed. Carries the complete snapshot, not a delta.
    StatusUpdate(StatusSnapshot),

    /// A log entry was appended.
    LogAppend(LogEntry),

    /// The log buffer was cleared; observers should drop their view.
    LogsCleared,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StatusUpdate(_) => "status-update",
            EventKind::LogAppend(_) => "log-append",
            EventKind::LogsCleared => "logs-cleared",
        }
    }
}

/// Event envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            kind,
        }
    }

    #[inline]
    pub fn status_update(snapshot: StatusSnapshot) -> Self {
        Event::new(EventKind::StatusUpdate(snapshot))
    }

    #[inline]
    pub fn log_append(entry: LogEntry) -> Self {
        Event::new(EventKind::LogAppend(entry))
    }

    #[inline]
    pub fn logs_cleared() -> Self {
        Event::new(EventKind::LogsCleared)
    }

    #[inline]
    pub fn is_status_update(&self) -> bool {
        matches!(self.kind, EventKind::StatusUpdate(_))
    }

    /// JSON text frame for the push channel.
    pub fn to_json(&self) -> String {
        // Only plain data and string-keyed maps; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
