//! # ControlSurface: the operator command set.
//!
//! Every command returns a structured report; none of them returns an
//! error. Commands reach collaborators only through the supervisor, so
//! `start()` / `stop()` stay serialised with restarts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::control::report::{
    Ack, BatchReport, CheckResult, DiagnosticCheck, OperationOutcome, RestartAllReport, RestartReport,
    StartAllReport, StatusReport, StopAllReport,
};
use crate::core::Supervisor;
use crate::state::{LogEntry, LogLevel};
use crate::subscribers::Subscription;
use crate::system::SystemMetrics;

/// Cheap, cloneable handle to the command set.
#[derive(Clone)]
pub struct ControlSurface {
    sup: Arc<Supervisor>,
}

impl ControlSurface {
    pub fn new(sup: Arc<Supervisor>) -> Self {
        Self { sup }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.sup
    }

    /// Starts every service in registration order.
    pub async fn start_all(&self) -> StartAllReport {
        self.sup.logs().info("Starting all services");
        let mut per_service = BTreeMap::new();
        for slot in self.sup.slots() {
            let outcome = match self.sup.start_service(slot).await {
                Ok(()) => OperationOutcome::Ok,
                Err(err) => OperationOutcome::Error {
                    details: err.to_string(),
                },
            };
            per_service.insert(slot.name().to_string(), outcome);
        }
        let report = BatchReport::from_outcomes(per_service);
        self.log_batch("Start-all", &report);
        report
    }

    /// Stops every service in registration order.
    pub async fn stop_all(&self) -> StopAllReport {
        self.sup.logs().info("Stopping all services");
        let mut per_service = BTreeMap::new();
        for slot in self.sup.slots() {
            let outcome = match self.sup.stop_service(slot).await {
                Ok(()) => OperationOutcome::Ok,
                Err(err) => OperationOutcome::Error {
                    details: err.to_string(),
                },
            };
            per_service.insert(slot.name().to_string(), outcome);
        }
        let report = BatchReport::from_outcomes(per_service);
        self.log_batch("Stop-all", &report);
        report
    }

    /// Restarts one service. Joins a restart already in flight.
    pub async fn restart(&self, name: &str) -> RestartReport {
        if self.sup.slot(name).is_none() {
            self.sup
                .logs()
                .warning(format!("Restart requested for unknown service {name}"));
        }
        self.sup.restart(name).await
    }

    /// Stops every service, pauses for `restart_all_pause`, then starts
    /// every service.
    pub async fn restart_all(&self) -> RestartAllReport {
        self.sup.logs().info("Restarting all services");
        let stopped = self.stop_all().await;
        tokio::time::sleep(self.sup.config().restart_all_pause).await;
        let started = self.start_all().await;

        let success = stopped.success && started.success;
        if success {
            self.sup.logs().success("Restart-all completed");
        } else {
            self.sup.logs().warning("Restart-all completed with failures");
        }
        RestartAllReport {
            success,
            stopped,
            started,
        }
    }

    /// Suspends periodic probing. Idempotent.
    pub fn pause_monitoring(&self) -> Ack {
        if self.sup.pause_monitoring() {
            Ack::ok("monitoring paused")
        } else {
            Ack::ok("monitoring already paused")
        }
    }

    /// Resumes periodic probing. Idempotent.
    pub fn resume_monitoring(&self) -> Ack {
        if self.sup.resume_monitoring() {
            Ack::ok("monitoring resumed")
        } else {
            Ack::ok("monitoring already active")
        }
    }

    /// Registry snapshot plus host metrics.
    pub fn status(&self) -> StatusReport {
        let snapshot = self.sup.registry().snapshot();
        StatusReport {
            services: snapshot.services,
            monitoring: self.sup.is_monitoring(),
            system: SystemMetrics::collect(self.sup.started_at()),
            timestamp: Utc::now(),
        }
    }

    /// Up to `limit` most recent log entries, newest first.
    pub fn logs(&self, limit: usize) -> Vec<LogEntry> {
        self.sup.logs().recent(limit)
    }

    pub fn clear_logs(&self) -> Ack {
        self.sup.logs().clear();
        info!("activity log cleared");
        Ack::ok("logs cleared")
    }

    /// Fresh probe of every collaborator, plus its self-test.
    ///
    /// The self-test is skipped when the probe failed or when the
    /// collaborator has none. Does not change the registry.
    pub async fn diagnostic(&self) -> Vec<DiagnosticCheck> {
        self.sup.logs().info("Running diagnostic");
        let probe = self.sup.probe();
        let limit = self.sup.config().lifecycle_timeout;
        let mut checks = Vec::with_capacity(self.sup.slots().len() * 2);

        for slot in self.sup.slots() {
            let name = slot.name();
            let outcome = probe.check(slot.collaborator().as_ref()).await;
            let mut details = outcome.details.clone();
            let attempts = slot.restart_attempts();
            if attempts > 0 {
                details.push_str(&format!(" ({attempts} restart attempts since last healthy)"));
            }
            let healthy = outcome.is_healthy();
            checks.push(DiagnosticCheck::new(
                format!("{name} probe"),
                if healthy { CheckResult::Pass } else { CheckResult::Fail },
                details,
            ));

            let test_name = format!("{name} self-test");
            if !healthy {
                checks.push(DiagnosticCheck::new(test_name, CheckResult::Skip, format!("{name} is not healthy")));
                continue;
            }
            let check = match tokio::time::timeout(limit, slot.collaborator().self_test()).await {
                Ok(None) => DiagnosticCheck::new(test_name, CheckResult::Skip, "no self-test"),
                Ok(Some(Ok(details))) => DiagnosticCheck::new(test_name, CheckResult::Pass, details),
                Ok(Some(Err(err))) => DiagnosticCheck::new(test_name, CheckResult::Fail, err.to_string()),
                Err(_) => DiagnosticCheck::new(test_name, CheckResult::Fail, format!("timed out after {limit:?}")),
            };
            checks.push(check);
        }

        let count = |r: CheckResult| checks.iter().filter(|c| c.result == r).count();
        let (pass, fail, skip) = (count(CheckResult::Pass), count(CheckResult::Fail), count(CheckResult::Skip));
        let level = if fail == 0 { LogLevel::Success } else { LogLevel::Warning };
        self.sup.logs().append(
            format!("Diagnostic finished: {pass} passed, {fail} failed, {skip} skipped"),
            level,
        );
        checks
    }

    /// Subscribes to the push channel with `backlog` log entries replayed.
    pub fn subscribe(&self, backlog: usize) -> Subscription {
        self.sup
            .broadcaster()
            .subscribe(self.sup.registry(), self.sup.logs(), backlog)
    }

    fn log_batch(&self, verb: &str, report: &BatchReport) {
        let failed: Vec<&str> = report
            .per_service
            .iter()
            .filter(|(_, o)| !o.is_ok())
            .map(|(name, _)| name.as_str())
            .collect();
        if failed.is_empty() {
            self.sup
                .logs()
                .success(format!("{verb} completed"));
        } else {
            self.sup
                .logs()
                .warning(format!("{verb} completed with failures: {}", failed.join(", ")));
        }
    }
}
