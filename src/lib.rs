//! # servicevisor
//!
//! **Servicevisor** is the control plane of a bot built from several
//! independently-failing collaborators (a data store, a chat session client,
//! a catalog loader, an inference backend, ...).
//!
//! It tracks the health of every collaborator, streams live status and a
//! rolling activity log to any number of observers, and periodically
//! reconciles observed state by restarting unhealthy collaborators.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Collaborator │   │ Collaborator │   │ Collaborator │
//!     │  (database)  │   │  (whatsapp)  │   │  (catalog)   │
//!     └──────▲───────┘   └──────▲───────┘   └──────▲───────┘
//!            │ probe/start/stop │                  │
//! ┌──────────┴──────────────────┴──────────────────┴──────────────────┐
//! │  Supervisor                                                       │
//! │  - Probe (timeout + panic isolation, concurrent per tick)         │
//! │  - Slot per collaborator (lifecycle lock, backoff state)          │
//! │  - single-flight restarts on a TaskTracker                        │
//! └──────┬──────────────────────────────────────┬─────────────────────┘
//!        │ upsert                               │ append
//!        ▼                                      ▼
//!   ┌──────────┐                          ┌───────────┐
//!   │ Registry │                          │ LogBuffer │
//!   └────┬─────┘                          └─────┬─────┘
//!        │ status-update                        │ log-append / logs-cleared
//!        └──────────────────┬───────────────────┘
//!                           ▼
//!                  ┌─────────────────┐
//!                  │   Broadcaster   │  one bounded mailbox per observer
//!                  └──┬──────┬────┬──┘
//!                     ▼      ▼    ▼
//!                    ws     ws   LogWriter (tracing)
//!
//!   ControlSurface ── start_all / stop_all / restart / restart_all / status /
//!                     logs / clear_logs / diagnostic / subscribe /
//!                     pause_monitoring / resume_monitoring
//!        ▲
//!        └── api::router (axum)
//! ```
//!
//! ### Service lifecycle
//! ```text
//! Unknown    ──probe healthy──►   Running
//! Unknown    ──probe unhealthy──► Error
//! Running    ──probe unhealthy──► Error ──► restart (out-of-line, backoff)
//! Error      ──probe healthy──►   Running
//! Running    ──stop command──►    Stopped     (no longer probed)
//! Stopped    ──start command──►   Connecting
//! Connecting ──probe healthy──►   Running
//! Connecting ──N unhealthy──►     Error
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                         |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Supervision**   | Periodic probing, status machine, restarts with backoff. | [`Supervisor`], [`Probe`]                  |
//! | **Collaborators** | The contract supervised services implement.              | [`Collaborator`], [`TcpEndpoint`], [`HttpEndpoint`] |
//! | **State**         | Service table and bounded activity log.                  | [`Registry`], [`LogBuffer`]                |
//! | **Push channel**  | Snapshot-first fan-out to observers.                     | [`Broadcaster`], [`Subscription`], [`Subscribe`] |
//! | **Commands**      | Structured, never-failing operator commands.             | [`ControlSurface`]                         |
//! | **Policies**      | Restart pacing.                                          | [`BackoffPolicy`], [`JitterPolicy`]        |
//! | **Errors**        | Typed errors with stable labels.                         | [`ProbeError`], [`RestartError`], [`RuntimeError`] |
//! | **Configuration** | Defaults plus `SERVICEVISOR_*` overrides.                | [`Config`]                                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use servicevisor::{Collaborator, CollaboratorError, Config, ControlSurface, Health, Supervisor};
//!
//! struct Catalog;
//!
//! #[async_trait]
//! impl Collaborator for Catalog {
//!     fn name(&self) -> &str { "catalog" }
//!     async fn probe(&self) -> Health { Health::healthy("128 products loaded") }
//!     async fn start(&self) -> Result<(), CollaboratorError> { Ok(()) }
//!     async fn stop(&self) -> Result<(), CollaboratorError> { Ok(()) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { tick_interval: Duration::from_millis(20), ..Config::default() };
//!     let sup = Supervisor::builder(cfg)
//!         .with_collaborator(Arc::new(Catalog))
//!         .build()?;
//!     let control = ControlSurface::new(sup.clone());
//!
//!     let token = CancellationToken::new();
//!     let runner = tokio::spawn({
//!         let sup = sup.clone();
//!         let token = token.clone();
//!         async move { sup.run(token).await }
//!     });
//!
//!     let report = control.start_all().await;
//!     assert!(report.success);
//!
//!     token.cancel();
//!     runner.await??;
//!     Ok(())
//! }
//! ```

mod collaborators;
mod config;
mod control;
mod core;
mod error;
mod events;
mod policies;
mod state;
mod subscribers;
mod system;

pub mod api;

// ---- Public re-exports ----

pub use collaborators::{Collaborator, CollaboratorRef, EndpointSpec, Health, HttpEndpoint, TcpEndpoint};
pub use config::Config;
pub use control::{
    Ack, BatchReport, CheckResult, ControlSurface, DiagnosticCheck, OperationOutcome, RestartAllReport,
    RestartReport, StartAllReport, StatusReport, StopAllReport,
};
pub use crate::core::shutdown;
pub use crate::core::{Probe, ProbeOutcome, RestartOutcome, Supervisor, SupervisorBuilder};
pub use error::{
    BuildError, CollaboratorError, DeliveryError, EndpointError, ProbeError, RestartError, RuntimeError,
};
pub use events::{Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use state::{LogBuffer, LogEntry, LogLevel, Registry, ServiceRecord, ServiceStatus, StatusSnapshot};
pub use subscribers::{Broadcaster, LogWriter, Subscribe, SubscriberId, Subscription};
pub use system::SystemMetrics;
