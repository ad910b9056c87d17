//! # Broadcaster: mailbox-per-subscriber fan-out.
//!
//! Every observer owns one bounded mailbox. Publishing never blocks: each
//! mailbox gets a `try_send`, and a mailbox that is full or closed is removed
//! on the spot. Other subscribers are unaffected.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │
//!     ├──► [mailbox 1] ──► Subscription::recv()       (WebSocket client)
//!     │    (bounded)
//!     ├──► [mailbox 2] ──► worker ──► sink.on_event()  (attached Subscribe)
//!     │    (bounded)            └──► Err / panic → detach sink
//!     └──► [mailbox N] ✗ full → removed, warn
//! ```
//!
//! ## Rules
//! - **Per-subscriber FIFO**: each subscriber sees events in publish order
//! - **No cross-subscriber ordering**: A may lag behind B
//! - **Non-blocking**: `publish()` returns immediately
//! - **Snapshot first**: a new subscriber's first event is a full
//!   `status-update`, then the log backlog oldest→newest, then live events
//!
//! The snapshot guarantee holds because publishers emit while holding their
//! own state lock, and [`Broadcaster::subscribe`] holds both state locks
//! while it reads the snapshot and attaches the mailbox.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DeliveryError, panic_message};
use crate::events::Event;
use crate::state::{LogBuffer, Registry, StatusSnapshot};
use crate::subscribers::Subscribe;

/// Identifier of one subscription, unique per broadcaster.
pub type SubscriberId = u64;

struct Mailbox {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

struct Table {
    open: bool,
    mailboxes: BTreeMap<SubscriberId, Mailbox>,
}

struct Inner {
    table: Mutex<Table>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.table().mailboxes.remove(&id).is_some()
    }
}

/// Fan-out hub shared by every publisher. Cheap to clone.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// Creates a broadcaster whose mailboxes hold `capacity` live events (min 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(Table {
                    open: true,
                    mailboxes: BTreeMap::new(),
                }),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: Event) {
        self.publish_arc(Arc::new(event));
    }

    /// Publishes a pre-allocated event.
    ///
    /// Mailboxes that are full or closed are removed and logged; the others
    /// still receive the event.
    pub fn publish_arc(&self, event: Arc<Event>) {
        let mut table = self.inner.table();
        let mut failed: Vec<(SubscriberId, &'static str, DeliveryError)> = Vec::new();

        for (id, mailbox) in &table.mailboxes {
            match mailbox.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => failed.push((*id, mailbox.name, DeliveryError::Full)),
                Err(TrySendError::Closed(_)) => {
                    failed.push((*id, mailbox.name, DeliveryError::Closed))
                }
            }
        }

        for (id, name, err) in failed {
            table.mailboxes.remove(&id);
            warn!(
                subscriber = name,
                id,
                seq = event.seq,
                reason = err.as_label(),
                "subscriber removed: {err}"
            );
        }
    }

    /// Attaches a new observer.
    ///
    /// The first event delivered is the current registry snapshot, followed by
    /// up to `backlog` log entries (oldest first), followed by live events.
    /// `backlog` is clamped to the log capacity.
    pub fn subscribe(&self, registry: &Registry, logs: &LogBuffer, backlog: usize) -> Subscription {
        let backlog = backlog.min(logs.capacity());
        let records = registry.read();
        let ring = logs.lock();

        let entries = ring.recent(backlog);
        let mut initial = Vec::with_capacity(entries.len() + 1);
        initial.push(Event::status_update(StatusSnapshot::from_records(&records)));
        initial.extend(entries.into_iter().rev().map(Event::log_append));

        let sub = self.attach_mailbox("subscription", self.inner.capacity, initial);
        drop(ring);
        drop(records);
        sub
    }

    /// Drives `sink` from a live-only subscription on a dedicated worker.
    ///
    /// The worker ends when the broadcaster closes or when the sink fails
    /// (returns `Err` or panics); a failing sink is detached, others continue.
    pub fn attach(&self, sink: Arc<dyn Subscribe>) -> JoinHandle<()> {
        let sub = self.attach_mailbox(sink.name(), sink.queue_capacity().max(1), Vec::new());
        sub.drive(sink)
    }

    /// Removes a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.remove(id)
    }

    /// Drops every mailbox. Later subscriptions end immediately.
    pub fn close(&self) {
        let mut table = self.inner.table();
        table.open = false;
        let dropped = std::mem::take(&mut table.mailboxes);
        debug!(subscribers = dropped.len(), "broadcaster closed");
    }

    pub fn is_closed(&self) -> bool {
        !self.inner.table().open
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.inner.table().mailboxes.contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.inner.table().mailboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table().mailboxes.is_empty()
    }

    fn attach_mailbox(&self, name: &'static str, capacity: usize, initial: Vec<Event>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity + initial.len());

        let mut table = self.inner.table();
        if table.open {
            for ev in initial {
                // capacity was sized for the initial batch
                let _ = tx.try_send(Arc::new(ev));
            }
            table.mailboxes.insert(id, Mailbox { name, sender: tx });
        }

        Subscription {
            id,
            receiver: rx,
            owner: Arc::downgrade(&self.inner),
        }
    }
}

/// Receiving end of one mailbox. Unsubscribes on drop.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Event>>,
    owner: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the mailbox was removed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        match self.receiver.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Spawns a worker feeding every event to `sink` until it fails.
    pub fn drive(mut self, sink: Arc<dyn Subscribe>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(ev) = self.recv().await {
                let fut = sink.on_event(ev.as_ref());
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(
                            subscriber = sink.name(),
                            reason = err.as_label(),
                            "subscriber detached: {err}"
                        );
                        break;
                    }
                    Err(panic) => {
                        warn!(
                            subscriber = sink.name(),
                            info = %panic_message(&*panic),
                            "subscriber panicked, detached"
                        );
                        break;
                    }
                }
            }
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.owner.upgrade() {
            inner.remove(self.id);
        }
    }
}
