//! Pushed events: the envelope observers receive.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification, payload and sequence
//!
//! ## Quick reference
//! - **Publishers**: `Registry` (every mutation), `LogBuffer` (append, clear).
//! - **Transport**: [`Broadcaster`](crate::Broadcaster), one mailbox per
//!   subscriber.
//! - **Consumers**: WebSocket clients, embedded [`Subscribe`](crate::Subscribe)
//!   sinks such as [`LogWriter`](crate::LogWriter).

mod event;

pub use event::{Event, EventKind};
