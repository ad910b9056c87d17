//! # Per-collaborator supervision state.
//!
//! A [`Slot`] pairs one collaborator with:
//! - a **lifecycle lock** serialising `start()` / `stop()` between the
//!   restart path and control commands;
//! - **restart bookkeeping**: consecutive attempts and the earliest instant
//!   the next automatic restart may begin;
//! - the number of unhealthy probes seen while `Connecting`.
//!
//! ## Status transitions
//! ```text
//! Stopped                        ──► Stopped      (never probed)
//! any        + healthy           ──► Running
//! Connecting + unhealthy (< N)   ──► Connecting
//! Connecting + unhealthy (N-th)  ──► Error
//! other      + unhealthy         ──► Error
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::collaborators::CollaboratorRef;
use crate::core::probe::ProbeOutcome;
use crate::policies::BackoffPolicy;
use crate::state::ServiceStatus;

/// Stand-in for a backoff window that does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Default)]
struct SlotState {
    /// Restart attempts since the service was last observed `Running`.
    restart_attempts: u32,
    /// Automatic restarts must not begin before this instant.
    not_before: Option<Instant>,
    /// Unhealthy probes while `Connecting`.
    connecting_failures: u32,
}

pub(crate) struct Slot {
    collaborator: CollaboratorRef,
    lifecycle: AsyncMutex<()>,
    state: Mutex<SlotState>,
}

impl Slot {
    pub(crate) fn new(collaborator: CollaboratorRef) -> Self {
        Self {
            collaborator,
            lifecycle: AsyncMutex::new(()),
            state: Mutex::new(SlotState::default()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.collaborator.name()
    }

    pub(crate) fn collaborator(&self) -> &CollaboratorRef {
        &self.collaborator
    }

    /// Waits for exclusive access to `start()` / `stop()`.
    pub(crate) async fn lifecycle(&self) -> AsyncMutexGuard<'_, ()> {
        self.lifecycle.lock().await
    }

    /// Exclusive access if no lifecycle operation is in progress.
    pub(crate) fn try_lifecycle(&self) -> Option<AsyncMutexGuard<'_, ()>> {
        self.lifecycle.try_lock().ok()
    }

    /// Applies one probe outcome to the previous status.
    pub(crate) fn observe(
        &self,
        previous: ServiceStatus,
        outcome: &ProbeOutcome,
        connect_attempts: u32,
    ) -> ServiceStatus {
        let mut st = self.state();
        let next = transition(previous, outcome.is_healthy(), st.connecting_failures + 1, connect_attempts);
        match next {
            ServiceStatus::Connecting => st.connecting_failures += 1,
            ServiceStatus::Running => {
                st.connecting_failures = 0;
                st.restart_attempts = 0;
                st.not_before = None;
            }
            _ => st.connecting_failures = 0,
        }
        next
    }

    /// Unhealthy probes seen in the current `Connecting` phase.
    pub(crate) fn connecting_failures(&self) -> u32 {
        self.state().connecting_failures
    }

    /// Starts a fresh `Connecting` phase (after a successful start).
    pub(crate) fn enter_connecting(&self) {
        self.state().connecting_failures = 0;
    }

    /// Clears restart bookkeeping (operator stop).
    pub(crate) fn reset_restarts(&self) {
        let mut st = self.state();
        st.restart_attempts = 0;
        st.not_before = None;
        st.connecting_failures = 0;
    }

    /// Whether a service that just turned `Error` qualifies for an
    /// automatic restart.
    pub(crate) fn wants_restart(&self, previous: ServiceStatus) -> bool {
        matches!(previous, ServiceStatus::Running | ServiceStatus::Connecting)
            || self.state().restart_attempts > 0
    }

    /// Whether the backoff window has elapsed.
    pub(crate) fn restart_due(&self, now: Instant) -> bool {
        self.state().not_before.is_none_or(|t| now >= t)
    }

    /// Records the start of a restart attempt and returns its 1-based number.
    pub(crate) fn begin_restart(&self) -> u32 {
        let mut st = self.state();
        st.restart_attempts = st.restart_attempts.saturating_add(1);
        st.connecting_failures = 0;
        st.restart_attempts
    }

    /// Schedules the earliest next automatic restart and returns the delay.
    pub(crate) fn schedule_next(&self, backoff: &BackoffPolicy) -> Duration {
        let mut st = self.state();
        let delay = backoff.next(st.restart_attempts.saturating_sub(1));
        let now = Instant::now();
        st.not_before = Some(now.checked_add(delay).unwrap_or(now + FAR_FUTURE));
        delay
    }

    pub(crate) fn restart_attempts(&self) -> u32 {
        self.state().restart_attempts
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pure status transition for one probe result.
///
/// `failures` counts this probe when unhealthy while `Connecting`.
pub(crate) fn transition(
    previous: ServiceStatus,
    healthy: bool,
    failures: u32,
    connect_attempts: u32,
) -> ServiceStatus {
    match (previous, healthy) {
        (ServiceStatus::Stopped, _) => ServiceStatus::Stopped,
        (_, true) => ServiceStatus::Running,
        (ServiceStatus::Connecting, false) if failures < connect_attempts.max(1) => {
            ServiceStatus::Connecting
        }
        (_, false) => ServiceStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::{Collaborator, Health};
    use crate::error::{CollaboratorError, ProbeError};

    struct Noop;

    #[async_trait]
    impl Collaborator for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        async fn probe(&self) -> Health {
            Health::healthy("ok")
        }
        async fn start(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    fn outcome(healthy: bool) -> ProbeOutcome {
        if healthy {
            ProbeOutcome {
                status: ServiceStatus::Running,
                details: "ok".into(),
                error: None,
            }
        } else {
            ProbeOutcome {
                status: ServiceStatus::Error,
                details: "down".into(),
                error: Some(ProbeError::Failure { details: "down".into() }),
            }
        }
    }

    #[test]
    fn test_transition_table() {
        use ServiceStatus::*;
        assert_eq!(transition(Unknown, true, 1, 3), Running);
        assert_eq!(transition(Unknown, false, 1, 3), Error);
        assert_eq!(transition(Running, false, 1, 3), Error);
        assert_eq!(transition(Error, true, 1, 3), Running);
        assert_eq!(transition(Connecting, true, 1, 3), Running);
        assert_eq!(transition(Connecting, false, 2, 3), Connecting);
        assert_eq!(transition(Connecting, false, 3, 3), Error);
        assert_eq!(transition(Stopped, true, 1, 3), Stopped);
    }

    #[test]
    fn test_connecting_tolerates_n_minus_one_failures() {
        let slot = Slot::new(Arc::new(Noop));
        let mut status = ServiceStatus::Connecting;
        status = slot.observe(status, &outcome(false), 3);
        assert_eq!(status, ServiceStatus::Connecting);
        status = slot.observe(status, &outcome(false), 3);
        assert_eq!(status, ServiceStatus::Connecting);
        assert_eq!(slot.connecting_failures(), 2);
        status = slot.observe(status, &outcome(false), 3);
        assert_eq!(status, ServiceStatus::Error);
        assert_eq!(slot.connecting_failures(), 0);
    }

    #[test]
    fn test_backoff_schedule_and_reset_on_running() {
        let slot = Slot::new(Arc::new(Noop));
        let backoff = BackoffPolicy::default();
        assert!(slot.restart_due(Instant::now()));
        assert!(!slot.wants_restart(ServiceStatus::Error));

        assert_eq!(slot.begin_restart(), 1);
        assert_eq!(slot.schedule_next(&backoff), Duration::from_secs(1));
        assert_eq!(slot.begin_restart(), 2);
        assert_eq!(slot.schedule_next(&backoff), Duration::from_secs(2));
        assert!(!slot.restart_due(Instant::now()));
        assert!(slot.wants_restart(ServiceStatus::Error));

        slot.observe(ServiceStatus::Error, &outcome(true), 3);
        assert_eq!(slot.restart_attempts(), 0);
        assert!(slot.restart_due(Instant::now()));
    }

    #[test]
    fn test_unbounded_backoff_window_does_not_panic() {
        let slot = Slot::new(Arc::new(Noop));
        let backoff = BackoffPolicy::constant(Duration::from_secs(u64::MAX));
        slot.begin_restart();
        assert_eq!(slot.schedule_next(&backoff), Duration::from_secs(u64::MAX));
        assert!(!slot.restart_due(Instant::now()));
    }

    #[tokio::test]
    async fn test_lifecycle_lock_is_exclusive() {
        let slot = Slot::new(Arc::new(Noop));
        let guard = slot.lifecycle().await;
        assert!(slot.try_lifecycle().is_none());
        drop(guard);
        assert!(slot.try_lifecycle().is_some());
    }
}
