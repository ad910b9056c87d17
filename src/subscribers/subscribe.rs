//! # Callback-style subscribers.
//!
//! `Subscribe` is the extension point for plugging in-process event handlers
//! into the control plane. Each subscriber is driven by a dedicated worker fed
//! by its own bounded mailbox (see [`Broadcaster::attach`](crate::Broadcaster::attach)).
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block the publisher nor
//!   other subscribers.
//! - Each subscriber **declares** its mailbox capacity via
//!   [`Subscribe::queue_capacity`]. If it overflows, the subscriber is removed.
//! - Returning `Err` (or panicking) detaches this subscriber only.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use servicevisor::{DeliveryError, Event, EventKind, Subscribe};
//!
//! struct ErrorCounter;
//!
//! #[async_trait]
//! impl Subscribe for ErrorCounter {
//!     async fn on_event(&self, ev: &Event) -> Result<(), DeliveryError> {
//!         if let EventKind::LogAppend(entry) = &ev.kind {
//!             let _ = entry.level;
//!         }
//!         Ok(())
//!     }
//!     fn name(&self) -> &'static str { "error-counter" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::events::Event;

/// Contract for in-process event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should
/// avoid blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event. `Err` detaches the subscriber.
    async fn on_event(&self, event: &Event) -> Result<(), DeliveryError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's mailbox.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
