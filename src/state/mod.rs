//! Shared control-plane state.
//!
//! - [`Registry`] last-known status of every supervised service
//! - [`LogBuffer`] bounded activity log
//!
//! Both are independent siblings observed by the
//! [`Broadcaster`](crate::Broadcaster). Lock order, when more than one is
//! held: registry → log ring → subscriber table.

mod log_buffer;
mod record;
mod registry;

pub use log_buffer::{LogBuffer, LogEntry, LogLevel};
pub use record::{ServiceRecord, ServiceStatus, StatusSnapshot};
pub use registry::Registry;
