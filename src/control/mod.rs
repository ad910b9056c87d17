//! Operator commands and their reports.
//!
//! | Command | Method | Report |
//! |---|---|---|
//! | start-all | [`ControlSurface::start_all`] | [`StartAllReport`] |
//! | stop-all | [`ControlSurface::stop_all`] | [`StopAllReport`] |
//! | restart | [`ControlSurface::restart`] | [`RestartReport`] |
//! | restart-all | [`ControlSurface::restart_all`] | [`RestartAllReport`] |
//! | pause / resume monitoring | [`ControlSurface::pause_monitoring`], [`ControlSurface::resume_monitoring`] | [`Ack`] |
//! | status | [`ControlSurface::status`] | [`StatusReport`] |
//! | logs | [`ControlSurface::logs`] | `Vec<LogEntry>` |
//! | clear-logs | [`ControlSurface::clear_logs`] | [`Ack`] |
//! | diagnostic | [`ControlSurface::diagnostic`] | `Vec<DiagnosticCheck>` |

mod report;
mod surface;

pub use report::{
    Ack, BatchReport, CheckResult, DiagnosticCheck, OperationOutcome, RestartAllReport, RestartReport, StartAllReport,
    StatusReport, StopAllReport,
};
pub use surface::ControlSurface;
