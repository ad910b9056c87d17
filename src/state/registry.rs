//! # Registry: the table of known services.
//!
//! Holds one [`ServiceRecord`] per supervised service and publishes a full
//! `status-update` through the [`Broadcaster`] on every mutation.
//!
//! ## Rules
//! - Services are registered once at build time and never removed.
//! - `upsert` always refreshes `last_checked`.
//! - A record never returns to `Unknown`: an `Unknown` write over a known
//!   status only refreshes details and timestamp.
//! - Publishing happens while the write lock is held, so subscribers observe
//!   mutations in the order they were applied.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::events::Event;
use crate::state::record::{ServiceRecord, ServiceStatus, StatusSnapshot};
use crate::subscribers::Broadcaster;

/// Shared table of service records.
pub struct Registry {
    records: RwLock<BTreeMap<String, ServiceRecord>>,
    broadcaster: Broadcaster,
}

impl Registry {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            broadcaster,
        }
    }

    /// Registers a service as `Unknown`. Returns `false` if it already exists.
    pub fn register(&self, name: &str) -> bool {
        let mut records = self.write();
        if records.contains_key(name) {
            return false;
        }
        records.insert(name.to_string(), ServiceRecord::unknown(name));
        self.broadcaster
            .publish(Event::status_update(StatusSnapshot::from_records(&records)));
        true
    }

    /// Sets (or creates) a record and returns the status it replaced.
    pub fn upsert(
        &self,
        name: &str,
        status: ServiceStatus,
        details: impl Into<String>,
    ) -> Option<ServiceStatus> {
        let details = details.into();
        let mut records = self.write();

        let previous = records.get(name).map(|r| r.status);
        let status = match previous {
            Some(prev) if status == ServiceStatus::Unknown => prev,
            _ => status,
        };

        records.insert(
            name.to_string(),
            ServiceRecord {
                name: name.to_string(),
                status,
                details,
                last_checked: Utc::now(),
            },
        );
        self.broadcaster
            .publish(Event::status_update(StatusSnapshot::from_records(&records)));
        previous
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.read().get(name).cloned()
    }

    pub fn status_of(&self, name: &str) -> Option<ServiceStatus> {
        self.read().get(name).map(|r| r.status)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::from_records(&self.read())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Read guard used by the broadcaster to take a snapshot that is
    /// consistent with subscriber attachment.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ServiceRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ServiceRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
