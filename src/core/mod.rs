//! Supervision core: probing, reconciliation, restarts, shutdown.
//!
//! The public API from this module is [`Supervisor`] (with its
//! [`SupervisorBuilder`]), [`Probe`] and [`RestartOutcome`].
//!
//! Internal modules:
//! - `probe`: bounded, panic-isolated health checks;
//! - `slot`: per-collaborator lifecycle lock, status machine and backoff state;
//! - `restart`: single-flight restart table and the restart procedure;
//! - `supervisor`: the reconciliation loop and start/stop of single services;
//! - `shutdown`: OS signal handling.

mod builder;
mod probe;
mod restart;
mod slot;
mod supervisor;

pub mod shutdown;

pub use builder::SupervisorBuilder;
pub use probe::{Probe, ProbeOutcome};
pub use restart::RestartOutcome;
pub use supervisor::Supervisor;
