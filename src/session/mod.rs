//! Session Module
//!
//! The protocol state machine on top of a `Transport`.
//!
//! ## Architecture
//! - `LockSession` owns the link and serializes dispatch (one command in
//!   flight, handed off fairly to queued callers)
//! - `PendingSlot` is the single pending-response placeholder
//! - `NotificationRouter` runs on the transport's thread and fills the
//!   slot without touching the dispatch lock

mod client;
mod router;
mod slot;
mod state;

pub use client::LockSession;
pub use router::{NotificationRouter, Observer, ObserverId, RouteOutcome};
pub use slot::{ArmedSlot, PendingSlot, WaitError};
pub use state::SessionState;
