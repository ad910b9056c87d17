//! Restart pacing.
//!
//! Decides **how long** a failing service waits before the supervisor tries
//! to restart it again.
//!
//! ## Contents
//! - [`BackoffPolicy`] delay growth (first / factor / max + jitter)
//! - [`JitterPolicy`]  optional randomization of a computed delay
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::slot::Slot records a failed restart:
//!           not_before = now + backoff.next(failures - 1)
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=60s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
