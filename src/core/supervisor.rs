//! # Supervisor: periodic reconciliation of observed service state.
//!
//! The [`Supervisor`] owns the registry, the activity log, the broadcaster
//! and one [`Slot`] per collaborator. On every tick it probes the services,
//! applies the status machine, records the result, and restarts services
//! that fell into `Error`.
//!
//! ## High-level architecture
//! ```text
//! run(token):
//!   interval(tick) ─► tick()
//!                      │
//!                      ├─ skip Stopped services and services mid-restart
//!                      ├─ Probe::check(...) concurrently (each bounded)
//!                      ├─ Slot::observe(prev, outcome) ─► Registry::upsert
//!                      │        └─ status changed ─► LogBuffer::append
//!                      └─ Error and restart due ─► request_restart()  (spawned, not awaited)
//!
//! Shutdown path:
//!   token.cancelled()
//!     └─► no new ticks; a tick in progress finishes its probes
//!     └─► tracker.close() + wait for restarts
//!            ├─ both done within cfg.grace → Ok
//!            └─ grace exceeded             → RuntimeError::GraceExceeded { stuck }
//!     └─► broadcaster.close()
//! ```
//!
//! ## Rules
//! - A tick never awaits a restart; a slow restart cannot stall probing.
//! - A tick does not overwrite a service whose `start()` / `stop()` is in
//!   progress; that service is picked up again on the next tick.
//! - There is no terminal state: a failing service keeps being restarted,
//!   paced by the backoff policy.
//! - While monitoring is paused ([`Supervisor::pause_monitoring`]) ticks do
//!   nothing; commands keep working.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use servicevisor::{Config, Supervisor, TcpEndpoint};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default())
//!         .with_collaborator(Arc::new(TcpEndpoint::new("database", "127.0.0.1:27017")))
//!         .build()?;
//!
//!     let token = CancellationToken::new();
//!     sup.run(token).await?;
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::CollaboratorRef;
use crate::config::Config;
use crate::core::builder::SupervisorBuilder;
use crate::core::probe::Probe;
use crate::core::restart::{RestartOutcome, Restarts};
use crate::core::slot::Slot;
use crate::error::{CollaboratorError, RestartError, RuntimeError};
use crate::state::{LogBuffer, LogLevel, Registry, ServiceStatus};
use crate::subscribers::Broadcaster;

const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Reconciles live collaborator health with the registry.
pub struct Supervisor {
    pub(crate) cfg: Config,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) registry: Arc<Registry>,
    pub(crate) logs: Arc<LogBuffer>,
    pub(crate) restarts: Restarts,
    probe: Probe,
    /// Registration order.
    slots: Vec<Arc<Slot>>,
    index: HashMap<String, usize>,
    running: AtomicBool,
    monitoring: AtomicBool,
    /// Services whose probe belongs to the tick in progress.
    probing: Mutex<BTreeSet<String>>,
    started_at: Instant,
}

impl Supervisor {
    /// Returns a builder; see [`SupervisorBuilder`].
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        broadcaster: Broadcaster,
        registry: Arc<Registry>,
        logs: Arc<LogBuffer>,
        collaborators: Vec<CollaboratorRef>,
    ) -> Self {
        let index = collaborators
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), i))
            .collect();
        let slots = collaborators.into_iter().map(|c| Arc::new(Slot::new(c))).collect();

        Self {
            probe: Probe::new(cfg.probe_timeout),
            cfg,
            broadcaster,
            registry,
            logs,
            restarts: Restarts::new(),
            slots,
            index,
            running: AtomicBool::new(false),
            monitoring: AtomicBool::new(true),
            probing: Mutex::new(BTreeSet::new()),
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn logs(&self) -> &Arc<LogBuffer> {
        &self.logs
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// When this supervisor was built.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Collaborators in registration order.
    pub fn collaborators(&self) -> impl Iterator<Item = &CollaboratorRef> {
        self.slots.iter().map(|s| s.collaborator())
    }

    /// Names of services with a restart in flight.
    pub fn restarts_in_flight(&self) -> Vec<String> {
        self.restarts.names()
    }

    /// Whether ticks currently probe services.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Suspends periodic probing. Returns `false` if it was already paused.
    pub fn pause_monitoring(&self) -> bool {
        let changed = self.monitoring.swap(false, Ordering::SeqCst);
        if changed {
            info!("monitoring paused");
            self.logs.warning("Monitoring paused");
        }
        changed
    }

    /// Resumes periodic probing. Returns `false` if it was not paused.
    pub fn resume_monitoring(&self) -> bool {
        let changed = !self.monitoring.swap(true, Ordering::SeqCst);
        if changed {
            info!("monitoring resumed");
            self.logs.info("Monitoring resumed");
        }
        changed
    }

    pub(crate) fn slot(&self, name: &str) -> Option<&Arc<Slot>> {
        self.index.get(name).and_then(|&i| self.slots.get(i))
    }

    pub(crate) fn slots(&self) -> &[Arc<Slot>] {
        &self.slots
    }

    /// Runs the reconciliation loop until `token` is cancelled, then lets a
    /// tick in progress finish and waits for in-flight restarts, both within
    /// `cfg.grace`, and closes the broadcaster.
    ///
    /// May be called once; a second call returns `RuntimeError::AlreadyRunning`.
    pub async fn run(self: &Arc<Self>, token: CancellationToken) -> Result<(), RuntimeError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let mut interval = tokio::time::interval(self.cfg.tick_interval_clamped());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            services = self.slots.len(),
            tick = ?self.cfg.tick_interval,
            "supervisor started"
        );
        self.logs
            .info(format!("Monitoring started ({} services)", self.slots.len()));

        let mut deadline = None;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let tick = self.tick();
                    tokio::pin!(tick);
                    tokio::select! {
                        biased;
                        _ = &mut tick => {}
                        _ = token.cancelled() => {
                            let until = self.grace_deadline();
                            deadline = Some(until);
                            if tokio::time::timeout_at(until, &mut tick).await.is_err() {
                                let stuck = self.probing_names();
                                warn!(grace = ?self.cfg.grace, ?stuck, "tick did not finish within grace");
                                self.logs.info("Monitoring stopped");
                                self.broadcaster.close();
                                return Err(RuntimeError::GraceExceeded {
                                    grace: self.cfg.grace,
                                    stuck,
                                });
                            }
                            break;
                        }
                    }
                }
            }
        }

        info!("supervisor stopping");
        self.logs.info("Monitoring stopped");
        let deadline = deadline.unwrap_or_else(|| self.grace_deadline());
        let res = self.wait_restarts_until(deadline).await;
        self.broadcaster.close();
        res
    }

    /// One reconciliation pass.
    pub async fn tick(self: &Arc<Self>) {
        if !self.is_monitoring() {
            debug!("monitoring paused, tick skipped");
            return;
        }
        let targets: Vec<&Arc<Slot>> = self
            .slots
            .iter()
            .filter(|s| {
                self.registry.status_of(s.name()) != Some(ServiceStatus::Stopped)
                    && !self.restarts.contains(s.name())
            })
            .collect();

        self.probing()
            .extend(targets.iter().map(|s| s.name().to_string()));
        let outcomes = join_all(targets.iter().map(|s| self.probe.check(s.collaborator().as_ref()))).await;
        self.probing().clear();

        for (slot, outcome) in targets.into_iter().zip(outcomes) {
            let name = slot.name();
            let Some(_lifecycle) = slot.try_lifecycle() else {
                debug!(service = name, "lifecycle operation in progress, skipping");
                continue;
            };
            if self.restarts.contains(name) {
                continue;
            }
            let previous = self.registry.status_of(name).unwrap_or(ServiceStatus::Unknown);
            if previous == ServiceStatus::Stopped {
                continue;
            }

            let next = slot.observe(previous, &outcome, self.cfg.connect_attempts_clamped());
            let details = if next == ServiceStatus::Connecting {
                format!(
                    "{} (attempt {}/{})",
                    outcome.details,
                    slot.connecting_failures(),
                    self.cfg.connect_attempts_clamped()
                )
            } else {
                outcome.details.clone()
            };
            self.registry.upsert(name, next, details);

            if next != previous {
                self.log_transition(name, previous, next, &outcome.details);
            }

            if next == ServiceStatus::Error && slot.wants_restart(previous) {
                if slot.restart_due(Instant::now()) {
                    drop(self.request_restart(slot));
                } else {
                    debug!(service = name, "restart deferred by backoff");
                }
            }
        }
    }

    /// Restarts one service through the single-flight path and waits for the
    /// outcome. Ignores the backoff window.
    pub async fn restart(self: &Arc<Self>, name: &str) -> RestartOutcome {
        match self.slot(name) {
            Some(slot) => self.request_restart(slot).await,
            None => RestartOutcome::failed(
                name,
                0,
                RestartError::UnknownService {
                    name: name.to_string(),
                },
                None,
            ),
        }
    }

    /// Starts one service. Success moves it to `Connecting`, failure to `Error`.
    pub(crate) async fn start_service(&self, slot: &Slot) -> Result<(), CollaboratorError> {
        let _lifecycle = slot.lifecycle().await;
        let name = slot.name();
        let limit = self.cfg.lifecycle_timeout;
        self.logs.info(format!("Starting {name}"));

        let res = match tokio::time::timeout(limit, slot.collaborator().start()).await {
            Ok(res) => res,
            Err(_) => Err(CollaboratorError::new(format!("start timed out after {limit:?}"))),
        };
        match &res {
            Ok(()) => {
                slot.enter_connecting();
                self.registry
                    .upsert(name, ServiceStatus::Connecting, "started, awaiting probe");
                self.logs.success(format!("{name} started"));
                info!(service = name, "started");
            }
            Err(err) => {
                self.registry.upsert(name, ServiceStatus::Error, err.to_string());
                self.logs.error(format!("{name} failed to start: {err}"));
                warn!(service = name, error = %err, "start failed");
            }
        }
        res
    }

    /// Stops one service. Success moves it to `Stopped`, failure to `Error`.
    pub(crate) async fn stop_service(&self, slot: &Slot) -> Result<(), CollaboratorError> {
        let _lifecycle = slot.lifecycle().await;
        let name = slot.name();
        let limit = self.cfg.lifecycle_timeout;
        self.logs.info(format!("Stopping {name}"));

        let res = match tokio::time::timeout(limit, slot.collaborator().stop()).await {
            Ok(res) => res,
            Err(_) => Err(CollaboratorError::new(format!("stop timed out after {limit:?}"))),
        };
        match &res {
            Ok(()) => {
                slot.reset_restarts();
                self.registry
                    .upsert(name, ServiceStatus::Stopped, "stopped by operator");
                self.logs.info(format!("{name} stopped"));
                info!(service = name, "stopped");
            }
            Err(err) => {
                self.registry.upsert(name, ServiceStatus::Error, err.to_string());
                self.logs.error(format!("{name} failed to stop: {err}"));
                warn!(service = name, error = %err, "stop failed");
            }
        }
        res
    }

    fn log_transition(&self, name: &str, previous: ServiceStatus, next: ServiceStatus, details: &str) {
        let level = match next {
            ServiceStatus::Running => LogLevel::Success,
            ServiceStatus::Error => LogLevel::Error,
            _ => LogLevel::Info,
        };
        let message = match next {
            ServiceStatus::Error => format!("{name}: {previous} → {next} ({details})"),
            _ => format!("{name}: {previous} → {next}"),
        };
        self.logs.append(message, level);
    }

    async fn wait_restarts_until(&self, deadline: tokio::time::Instant) -> Result<(), RuntimeError> {
        let tracker = self.restarts.tracker();
        tracker.close();
        match tokio::time::timeout_at(deadline, tracker.wait()).await {
            Ok(()) => {
                debug!("all restarts finished within grace");
                Ok(())
            }
            Err(_) => {
                let stuck = self.restarts.names();
                warn!(grace = ?self.cfg.grace, ?stuck, "grace exceeded");
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.grace,
                    stuck,
                })
            }
        }
    }

    /// Shutdown deadline, saturating for very large grace periods.
    fn grace_deadline(&self) -> tokio::time::Instant {
        let now = tokio::time::Instant::now();
        now.checked_add(self.cfg.grace)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    fn probing(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.probing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn probing_names(&self) -> Vec<String> {
        self.probing().iter().cloned().collect()
    }
}
