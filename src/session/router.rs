//! Notification Router
//!
//! Turns inbound notifications into responses and hands them out.
//!
//! ## Delivery
//! 1. Parse the buffer; unparseable buffers are dropped
//! 2. Fill the pending slot if it waits for this command
//! 3. Fan out to every observer, each call isolated from the others
//!
//! The router never takes the dispatch lock, so a slow observer can delay
//! other observers but never the dispatcher it already woke.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::{parse_frame, Response};
use super::PendingSlot;

/// Passive subscriber to every parsed response
pub type Observer = Arc<dyn Fn(&Response) + Send + Sync>;

/// Registration token returned by `add_observer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// What happened to one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Not a valid frame
    Dropped,

    /// Parsed and handed out
    Routed {
        /// A pending dispatch took the response
        delivered: bool,

        /// Observers that returned normally
        observers: usize,
    },
}

/// Routes notifications to the pending slot and to observers
pub struct NotificationRouter {
    slot: Arc<PendingSlot>,
    observers: RwLock<Vec<(ObserverId, Observer)>>,
    next_id: AtomicU64,
}

impl NotificationRouter {
    /// Create a router filling `slot`
    pub fn new(slot: Arc<PendingSlot>) -> Self {
        Self {
            slot,
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer
    pub fn add_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Unregister an observer; false if it was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Route one inbound notification
    pub fn route(&self, bytes: &[u8]) -> RouteOutcome {
        let Some(response) = parse_frame(bytes) else {
            tracing::debug!(len = bytes.len(), "dropping unparseable notification");
            return RouteOutcome::Dropped;
        };

        tracing::trace!(
            command = response.command,
            status = %response.status,
            data_len = response.data.len(),
            "notification parsed"
        );

        let delivered = self.slot.fulfill(&response);

        // snapshot so observers may (un)register from inside a callback
        let observers: Vec<(ObserverId, Observer)> = self.observers.read().clone();
        let mut notified = 0;
        for (id, observer) in observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer(&response))) {
                Ok(()) => notified += 1,
                Err(_) => tracing::error!(observer = ?id, "observer panicked while handling response"),
            }
        }

        RouteOutcome::Routed {
            delivered,
            observers: notified,
        }
    }
}
