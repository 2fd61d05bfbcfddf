//! Pending-response slot
//!
//! Holds at most one waiter. Arming installs the sending half of a
//! one-element channel; the router fills it at most once; releasing drops
//! the sender, which wakes the waiter with a disconnect.

use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::protocol::{Command, Response};

struct Waiter {
    command: Command,
    tx: Sender<Response>,
}

/// The single dispatch slot
pub struct PendingSlot {
    waiter: Mutex<Option<Waiter>>,
}

/// Why an armed slot stopped waiting without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Deadline elapsed
    Timeout,

    /// Slot was released (link lost or session torn down)
    Released,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self {
            waiter: Mutex::new(None),
        }
    }

    /// Install a waiter for `command`
    ///
    /// The returned guard releases the slot when dropped.
    pub fn arm(&self, command: Command) -> ArmedSlot<'_> {
        let (tx, rx) = channel::bounded(1);
        let previous = self.waiter.lock().replace(Waiter { command, tx });
        debug_assert!(previous.is_none(), "pending slot armed twice");

        ArmedSlot { slot: self, rx }
    }

    /// Hand `response` to the waiter if it is waiting for that command
    ///
    /// Returns true when a waiter took it. The waiter is removed either way
    /// once matched, so a second response for the same command is not
    /// delivered.
    pub fn fulfill(&self, response: &Response) -> bool {
        let waiter = {
            let mut guard = self.waiter.lock();
            match guard.as_ref() {
                Some(waiter) if response.answers(waiter.command) => guard.take(),
                _ => None,
            }
        };

        match waiter {
            Some(waiter) => waiter.tx.try_send(response.clone()).is_ok(),
            None => false,
        }
    }

    /// Drop the current waiter, if any, waking it with `Released`
    pub fn release(&self) -> bool {
        self.waiter.lock().take().is_some()
    }

    /// Whether a waiter is installed
    pub fn is_armed(&self) -> bool {
        self.waiter.lock().is_some()
    }
}

impl Default for PendingSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of an armed slot
pub struct ArmedSlot<'a> {
    slot: &'a PendingSlot,
    rx: Receiver<Response>,
}

impl ArmedSlot<'_> {
    /// Block until the response arrives, `timeout` elapses, or the slot is
    /// released
    pub fn wait(&self, timeout: Duration) -> Result<Response, WaitError> {
        match self.rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Released),
        }
    }
}

impl Drop for ArmedSlot<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}
