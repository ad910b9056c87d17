//! # Event delivery to observers.
//!
//! [`Broadcaster`] owns one bounded mailbox per observer and fans every
//! published [`Event`](crate::Event) out to all of them.
//!
//! ## Architecture
//! ```text
//! Registry  ── upsert() ──┐
//!                         ├─► Broadcaster ──► mailbox ──► Subscription (WebSocket)
//! LogBuffer ── append() ──┘        │
//!                                  └────────► mailbox ──► worker ──► Subscribe sink
//!                                                                     │
//!                                                               LogWriter, custom
//! ```
//!
//! ## Subscriber types
//! - **Pull** - a [`Subscription`] read directly (push channel clients)
//! - **Callback** - a [`Subscribe`] sink driven by a worker ([`Broadcaster::attach`])

mod broadcaster;
mod embedded;
mod subscribe;

pub use broadcaster::{Broadcaster, SubscriberId, Subscription};
pub use embedded::LogWriter;
pub use subscribe::Subscribe;
