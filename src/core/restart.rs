//! # Single-flight restarts.
//!
//! At most one restart per service is in flight. Concurrent requests for the
//! same service join the running attempt and receive the same
//! [`RestartOutcome`].
//!
//! ```text
//! request("whatsapp") ─┐
//! request("whatsapp") ─┼─► inflight["whatsapp"] = Shared(fut) ──► one stop()+start()
//! tick (auto)         ─┘                                           │
//!                                                                  ▼
//!                                                  every caller gets the same outcome
//! ```
//!
//! The work itself runs on the supervisor's `TaskTracker`, so it completes
//! even when every caller stops waiting, and shutdown can wait for it.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::core::slot::Slot;
use crate::core::supervisor::Supervisor;
use crate::error::{RestartError, panic_message};
use crate::state::ServiceStatus;

/// Result of one restart attempt, shared by every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartOutcome {
    pub service: String,
    pub success: bool,
    pub details: String,
    /// 1-based attempt number since the service was last seen `Running`.
    pub attempt: u32,
    /// Earliest delay before the next automatic restart, set on failure.
    #[serde(with = "opt_millis", rename = "retryInMs")]
    pub retry_in: Option<Duration>,
    #[serde(skip)]
    pub error: Option<RestartError>,
}

impl RestartOutcome {
    pub(crate) fn failed(service: &str, attempt: u32, error: RestartError, retry_in: Option<Duration>) -> Self {
        Self {
            service: service.to_string(),
            success: false,
            details: error.to_string(),
            attempt,
            retry_in,
            error: Some(error),
        }
    }
}

pub(crate) type RestartFuture = Shared<BoxFuture<'static, RestartOutcome>>;

/// In-flight restart table plus the tracker their work runs on.
pub(crate) struct Restarts {
    inflight: Mutex<HashMap<String, RestartFuture>>,
    tracker: TaskTracker,
}

impl Restarts {
    pub(crate) fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.table().contains_key(name)
    }

    /// Names of services with a restart in flight.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, RestartFuture>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, name: &str) {
        self.table().remove(name);
    }
}

impl Supervisor {
    /// Joins the in-flight restart of `slot` or starts a new one.
    pub(crate) fn request_restart(self: &Arc<Self>, slot: &Arc<Slot>) -> RestartFuture {
        let name = slot.name().to_string();
        let mut table = self.restarts.table();
        if let Some(existing) = table.get(&name) {
            return existing.clone();
        }

        let (tx, rx) = oneshot::channel();
        let sup = Arc::clone(self);
        let work_slot = Arc::clone(slot);
        let work_name = name.clone();
        self.restarts.tracker.spawn(async move {
            let outcome = AssertUnwindSafe(sup.perform_restart(&work_slot))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    warn!(service = %work_name, info = %panic_message(&*panic), "restart panicked");
                    RestartOutcome::failed(&work_name, work_slot.restart_attempts(), RestartError::Aborted, None)
                });
            sup.restarts.remove(&work_name);
            let _ = tx.send(outcome);
        });

        let fallback = name.clone();
        let fut: RestartFuture = async move {
            rx.await
                .unwrap_or_else(|_| RestartOutcome::failed(&fallback, 0, RestartError::Aborted, None))
        }
        .boxed()
        .shared();
        table.insert(name, fut.clone());
        fut
    }

    /// One `stop()` + `start()` cycle under the slot's lifecycle lock.
    async fn perform_restart(&self, slot: &Slot) -> RestartOutcome {
        let _lifecycle = slot.lifecycle().await;
        let name = slot.name();
        let collaborator = slot.collaborator();
        let limit = self.cfg.lifecycle_timeout;

        let attempt = slot.begin_restart();
        info!(service = name, attempt, "restarting");
        self.logs.info(format!("Restarting {name} (attempt {attempt})"));
        self.registry
            .upsert(name, ServiceStatus::Connecting, format!("restarting (attempt {attempt})"));

        match tokio::time::timeout(limit, collaborator.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(service = name, error = %err, "stop failed during restart, starting anyway");
                self.logs.warning(format!("{name} stop failed: {err}"));
            }
            Err(_) => {
                warn!(service = name, timeout = ?limit, "stop timed out during restart, starting anyway");
                self.logs.warning(format!("{name} stop timed out after {limit:?}"));
            }
        }

        let started = match tokio::time::timeout(limit, collaborator.start()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(RestartError::Start { error }),
            Err(_) => Err(RestartError::Timeout {
                operation: "start",
                timeout: limit,
            }),
        };
        let delay = slot.schedule_next(&self.cfg.backoff);

        match started {
            Ok(()) => {
                slot.enter_connecting();
                self.registry
                    .upsert(name, ServiceStatus::Connecting, "restarted, awaiting probe");
                self.logs.success(format!("{name} restarted"));
                info!(service = name, attempt, "restart succeeded");
                RestartOutcome {
                    service: name.to_string(),
                    success: true,
                    details: "restarted, awaiting probe".to_string(),
                    attempt,
                    retry_in: None,
                    error: None,
                }
            }
            Err(error) => {
                self.registry.upsert(
                    name,
                    ServiceStatus::Error,
                    format!("{error}; next restart in {}s", delay.as_secs_f64()),
                );
                self.logs.error(format!("{name} restart failed: {error}"));
                warn!(
                    service = name,
                    attempt,
                    reason = error.as_label(),
                    retry_in = ?delay,
                    "restart failed"
                );
                RestartOutcome::failed(name, attempt, error, Some(delay))
            }
        }
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub(super) fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis().min(u128::from(u64::MAX)) as u64)),
            None => s.serialize_none(),
        }
    }
}
