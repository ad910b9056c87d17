//! # Probe: bounded health checks.
//!
//! Wraps a collaborator's `probe()` with a timeout and panic isolation and
//! maps the answer to a [`ServiceStatus`]. A probe never fails: every
//! problem becomes an `Error` status with readable details.
//!
//! ```text
//! probe() ──► healthy        ──► Running
//!         ├─► unhealthy(msg) ──► Error   "msg"
//!         ├─► timeout        ──► Error   "probe timed out after 5s"
//!         └─► panic          ──► Error   "probe panicked: ..."
//! ```

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;

use crate::collaborators::{Collaborator, CollaboratorRef};
use crate::error::{ProbeError, panic_message};
use crate::state::ServiceStatus;

/// Outcome of one probe, ready to be written to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ServiceStatus,
    pub details: String,
    /// Set when the service was found unhealthy.
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: ProbeError) -> Self {
        Self {
            status: ServiceStatus::Error,
            details: error.to_string(),
            error: Some(error),
        }
    }
}

/// Health checker with a fixed timeout.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    timeout: Duration,
}

impl Probe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probes one collaborator.
    pub async fn check(&self, collaborator: &dyn Collaborator) -> ProbeOutcome {
        let fut = AssertUnwindSafe(collaborator.probe()).catch_unwind();
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(health)) if health.healthy => ProbeOutcome {
                status: ServiceStatus::Running,
                details: health.details,
                error: None,
            },
            Ok(Ok(health)) => ProbeOutcome::failed(ProbeError::Failure {
                details: health.details,
            }),
            Ok(Err(panic)) => ProbeOutcome::failed(ProbeError::Panicked {
                info: panic_message(&*panic),
            }),
            Err(_elapsed) => ProbeOutcome::failed(ProbeError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    /// Probes all collaborators concurrently; results keep the input order.
    pub async fn check_all(&self, collaborators: &[CollaboratorRef]) -> Vec<ProbeOutcome> {
        join_all(collaborators.iter().map(|c| self.check(c.as_ref()))).await
    }
}
