//! # Service records and status snapshots.
//!
//! A [`ServiceRecord`] is the last-known state of one supervised service.
//! Records are owned by the [`Registry`](crate::Registry); everything handed
//! out to callers ([`StatusSnapshot`], `get()`) is a copy.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status of a supervised service.
///
/// `Unknown` is only valid before the first probe; once a record leaves it,
/// it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Unknown,
    Connecting,
    Running,
    Stopped,
    Error,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Unknown => "unknown",
            ServiceStatus::Connecting => "connecting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Error => "error",
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known state of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    pub status: ServiceStatus,
    pub details: String,
    pub last_checked: DateTime<Utc>,
}

impl ServiceRecord {
    /// A freshly registered record: `Unknown`, awaiting its first probe.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ServiceStatus::Unknown,
            details: "awaiting first probe".to_string(),
            last_checked: Utc::now(),
        }
    }
}

/// Consistent point-in-time copy of every record, ordered by service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub services: BTreeMap<String, ServiceRecord>,
    pub timestamp: DateTime<Utc>,
}

impl StatusSnapshot {
    pub(crate) fn from_records(records: &BTreeMap<String, ServiceRecord>) -> Self {
        Self {
            services: records.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.get(name)
    }

    pub fn status_of(&self, name: &str) -> Option<ServiceStatus> {
        self.services.get(name).map(|r| r.status)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ServiceStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ServiceStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_record_uses_camel_case_on_the_wire() {
        let record = ServiceRecord::unknown("database");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "unknown");
        assert!(value.get("lastChecked").is_some());
        assert!(value.get("last_checked").is_none());
    }
}
