//! # Structured command results.
//!
//! Commands never return errors to their caller. Partial failure is
//! expressed as `success: false` with per-service detail.
//!
//! ```json
//! {"success": false,
//!  "perService": {"catalog":  {"outcome": "error", "details": "start timed out after 30s"},
//!                 "database": {"outcome": "ok"}}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::RestartOutcome;
use crate::state::ServiceRecord;
use crate::system::SystemMetrics;

/// Result of one lifecycle operation on one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum OperationOutcome {
    Ok,
    Error { details: String },
}

impl OperationOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationOutcome::Ok)
    }
}

/// Result of `start_all` / `stop_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// `true` only if every service succeeded.
    pub success: bool,
    pub per_service: BTreeMap<String, OperationOutcome>,
}

impl BatchReport {
    pub(crate) fn from_outcomes(per_service: BTreeMap<String, OperationOutcome>) -> Self {
        Self {
            success: per_service.values().all(OperationOutcome::is_ok),
            per_service,
        }
    }

    pub fn outcome(&self, service: &str) -> Option<&OperationOutcome> {
        self.per_service.get(service)
    }
}

/// Result of `restart_all`: the stop phase followed by the start phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartAllReport {
    /// `true` only if both phases fully succeeded.
    pub success: bool,
    pub stopped: BatchReport,
    pub started: BatchReport,
}

pub type StartAllReport = BatchReport;
pub type StopAllReport = BatchReport;
pub type RestartReport = RestartOutcome;

/// Result of `status()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub services: BTreeMap<String, ServiceRecord>,
    /// Whether periodic probing is active.
    pub monitoring: bool,
    pub system: SystemMetrics,
    pub timestamp: DateTime<Utc>,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Verdict of one diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckResult::Pass => "PASS",
            CheckResult::Fail => "FAIL",
            CheckResult::Skip => "SKIP",
        })
    }
}

/// One line of the diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticCheck {
    pub name: String,
    pub result: CheckResult,
    pub details: String,
}

impl DiagnosticCheck {
    pub(crate) fn new(name: impl Into<String>, result: CheckResult, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result,
            details: details.into(),
        }
    }
}
