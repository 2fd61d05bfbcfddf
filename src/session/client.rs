//! Lock Session
//!
//! Connection lifecycle, PIN authentication and command dispatch for one
//! lock.
//!
//! ## State Machine
//! ```text
//!   Disconnected ──connect──▶ Connected ──verify_key──▶ Authenticated
//!        ▲                        │                          │
//!        └──── disconnect / unsolicited link loss ◀──────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::config::Config;
use crate::error::{LockError, Result};
use crate::protocol::{build_frame, Command, LockOperation, Response, Status};
use crate::transport::Transport;
use super::router::{NotificationRouter, ObserverId};
use super::slot::{PendingSlot, WaitError};
use super::state::{LinkState, SessionState};

/// State reachable from transport callbacks
struct Shared {
    link: Mutex<LinkState>,
    slot: Arc<PendingSlot>,
    router: NotificationRouter,
}

impl Shared {
    fn new() -> Self {
        let slot = Arc::new(PendingSlot::new());
        Self {
            link: Mutex::new(LinkState::new()),
            router: NotificationRouter::new(Arc::clone(&slot)),
            slot,
        }
    }

    fn link_lost(&self, epoch: u64) {
        if !self.link.lock().lose(epoch) {
            return;
        }

        tracing::warn!(epoch, "link lost unexpectedly");
        if self.slot.release() {
            tracing::debug!("woke pending dispatch after link loss");
        }
    }
}

/// A protocol session with one lock
///
/// ## Concurrency Model
///
/// - **Dispatch**: serialized by `dispatch_lock`, held for the whole
///   write + wait cycle; released with a fair unlock so queued callers are
///   served in arrival order
/// - **Lifecycle** (connect/disconnect): serialized by `lifecycle_lock`,
///   independent of dispatch so `disconnect` can interrupt a waiting command
/// - **Notifications**: routed on the transport's thread, never blocking on
///   either lock
pub struct LockSession<T: Transport> {
    /// Link to the device
    transport: T,

    /// Session configuration
    config: Config,

    /// State shared with transport callbacks
    shared: Arc<Shared>,

    /// Handle of the established link
    handle: Mutex<Option<Arc<T::Handle>>>,

    /// One command in flight at a time
    dispatch_lock: Mutex<()>,

    /// Serializes connect/disconnect
    lifecycle_lock: Mutex<()>,
}

impl<T: Transport> LockSession<T> {
    /// Create a disconnected session
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            shared: Arc::new(Shared::new()),
            handle: Mutex::new(None),
            dispatch_lock: Mutex::new(()),
            lifecycle_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connect to `device_id`
    ///
    /// Returns `Ok(true)` once connected, including when already connected.
    /// On failure every partially acquired resource is released and the
    /// session stays `Disconnected`.
    pub fn connect(&self, device_id: &str, timeout: Duration) -> Result<bool> {
        let _lifecycle = self.lifecycle_lock.lock();
        if self.is_connected() {
            return Ok(true);
        }

        // a link that died on its own may still hold a handle
        self.release_handle();

        let epoch = self.shared.link.lock().begin();
        tracing::debug!(device_id, ?timeout, epoch, "connecting");

        match self.establish(device_id, timeout, epoch) {
            Ok(()) => {
                tracing::info!(device_id, "connected");
                Ok(true)
            }
            Err(e) => {
                self.shared.link.lock().reset();
                tracing::warn!(device_id, error = %e, "connect failed");
                Err(e)
            }
        }
    }

    fn establish(&self, device_id: &str, timeout: Duration, epoch: u64) -> Result<()> {
        let handle = self.transport.connect(device_id, timeout)?;
        let guard = LinkGuard {
            transport: &self.transport,
            handle: Some(Arc::new(handle)),
        };
        let handle = guard.handle()?;

        let shared = Arc::clone(&self.shared);
        self.transport.subscribe_notifications(
            &handle,
            Box::new(move |bytes: &[u8]| {
                shared.router.route(bytes);
            }),
        )?;

        let shared = Arc::clone(&self.shared);
        self.transport
            .on_unsolicited_disconnect(&handle, Box::new(move || shared.link_lost(epoch)))?;

        *self.handle.lock() = Some(Arc::clone(&handle));
        if !self.shared.link.lock().establish(epoch) {
            self.handle.lock().take();
            return Err(LockError::Connection(
                "link dropped while connecting".to_string(),
            ));
        }

        guard.commit();
        Ok(())
    }

    /// Disconnect from the device
    ///
    /// Safe to call in any state. Wakes a command waiting for its response.
    pub fn disconnect(&self) {
        let _lifecycle = self.lifecycle_lock.lock();

        let was_connected = {
            let mut link = self.shared.link.lock();
            let was = link.state.is_connected();
            link.reset();
            was
        };

        if self.shared.slot.release() {
            tracing::debug!("cancelled pending dispatch");
        }

        self.release_handle();
        if was_connected {
            tracing::info!("disconnected");
        }
    }

    fn release_handle(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = self.transport.unsubscribe_notifications(&handle) {
                tracing::debug!(error = %e, "unsubscribe failed during teardown");
            }
            self.transport.disconnect(&handle);
        }
    }

    // =========================================================================
    // Lock operations
    // =========================================================================

    /// Verify the configured PIN with the lock
    ///
    /// Returns `Ok(true)` once authenticated. A rejected PIN or a missing
    /// response is an `Authentication` error; a PIN that is not exactly four
    /// ASCII characters fails with `InvalidArgument` before any I/O. A link
    /// lost or replaced while waiting is a `Connection` error.
    pub fn verify_key(&self) -> Result<bool> {
        self.verify_on_link().map(|_| true)
    }

    /// Verify the PIN; returns the epoch of the link now authenticated
    fn verify_on_link(&self) -> Result<u64> {
        let epoch = self.connected_epoch()?;
        let pin = encode_pin(&self.config.pin)?;
        let outcome = self.dispatch(Command::VerifyKey, &pin, self.config.command_timeout());

        let authenticated = matches!(&outcome, Ok(response) if response.is_success());
        let same_link = self
            .shared
            .link
            .lock()
            .set_authenticated(epoch, authenticated);

        match outcome {
            Ok(response) if response.is_success() => {
                if !same_link {
                    tracing::warn!(epoch, "link replaced during key verification");
                    return Err(LockError::Connection(
                        "link changed during key verification".to_string(),
                    ));
                }
                tracing::info!("key verified");
                Ok(epoch)
            }
            Ok(response) => Err(LockError::Authentication(format!(
                "key rejected (status: {})",
                response.status
            ))),
            Err(LockError::Timeout { .. }) => Err(LockError::Authentication(
                "no response to key verification".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Lock the device; `Ok(false)` if the lock refused
    pub fn lock(&self) -> Result<bool> {
        self.lock_op(LockOperation::Lock)
    }

    /// Unlock the device; `Ok(false)` if the lock refused
    pub fn unlock(&self) -> Result<bool> {
        self.lock_op(LockOperation::Unlock)
    }

    fn lock_op(&self, op: LockOperation) -> Result<bool> {
        let epoch = self.ensure_authenticated()?;

        let response = self.dispatch(
            Command::Operational,
            &[u8::from(op)],
            self.config.command_timeout(),
        )?;
        self.note_pairing(epoch, &response);

        if response.is_success() {
            tracing::info!(?op, "operation succeeded");
        } else {
            tracing::warn!(?op, status = %response.status, "operation rejected");
        }
        Ok(response.is_success())
    }

    /// Send a keep-alive; no authentication needed
    pub fn heartbeat(&self) -> Result<()> {
        let response = self.dispatch(Command::Heartbeat, &[], self.config.command_timeout())?;
        expect_success(Command::Heartbeat, &response)
    }

    /// Make the lock forget the paired key
    ///
    /// The session drops back to `Connected` on success.
    pub fn erase_key(&self) -> Result<()> {
        let epoch = self.ensure_authenticated()?;

        let response = self.dispatch(Command::EraseKey, &[], self.config.command_timeout())?;
        self.note_pairing(epoch, &response);
        expect_success(Command::EraseKey, &response)?;

        self.shared.link.lock().set_authenticated(epoch, false);
        tracing::info!("key erased");
        Ok(())
    }

    /// Send a device configuration block; returns the lock's reply
    pub fn configure(&self, data: &[u8]) -> Result<Response> {
        let epoch = self.ensure_authenticated()?;

        let response = self.dispatch(Command::Config, data, self.config.command_timeout())?;
        self.note_pairing(epoch, &response);
        expect_success(Command::Config, &response)?;
        Ok(response)
    }

    /// Verify the PIN first unless already authenticated
    ///
    /// Returns the epoch of the authenticated link. Only a session that is
    /// not connected at all fails with `Connection`; anything going wrong
    /// during the verify itself is an `Authentication` error.
    fn ensure_authenticated(&self) -> Result<u64> {
        let (epoch, authenticated) = {
            let link = self.shared.link.lock();
            if !link.state.is_connected() {
                return Err(not_connected());
            }
            (link.epoch, link.state.is_authenticated())
        };
        if authenticated {
            return Ok(epoch);
        }

        tracing::debug!("not authenticated, verifying key first");
        match self.verify_on_link() {
            Ok(epoch) => Ok(epoch),
            Err(e @ LockError::Authentication(_)) => Err(e),
            Err(other) => Err(LockError::Authentication(other.to_string())),
        }
    }

    /// The lock no longer knows us; force a fresh verify next time
    fn note_pairing(&self, epoch: u64, response: &Response) {
        if response.status == Status::NotPaired {
            tracing::debug!("lock reports not paired, dropping authentication");
            self.shared.link.lock().set_authenticated(epoch, false);
        }
    }

    fn connected_epoch(&self) -> Result<u64> {
        let link = self.shared.link.lock();
        if link.state.is_connected() {
            Ok(link.epoch)
        } else {
            Err(not_connected())
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Send one command and wait for its response
    ///
    /// Holds the dispatch lock for the full cycle, so at most one command is
    /// ever in flight. Fails with `Timeout` when nothing answers within
    /// `timeout` and with `Connection` when the link goes away meanwhile.
    pub fn dispatch(&self, cmd: Command, data: &[u8], timeout: Duration) -> Result<Response> {
        let guard = self.dispatch_lock.lock();
        let result = self.dispatch_exclusive(cmd, data, timeout);
        MutexGuard::unlock_fair(guard);
        result
    }

    /// Dispatch body (called with dispatch lock held)
    fn dispatch_exclusive(&self, cmd: Command, data: &[u8], timeout: Duration) -> Result<Response> {
        let frame = build_frame(cmd, data)?;
        let handle = self.current_handle()?;

        let armed = self.shared.slot.arm(cmd);

        // the link may have dropped before the slot was armed
        if !self.is_connected() {
            return Err(not_connected());
        }

        tracing::trace!(command = ?cmd, len = frame.len(), "writing frame");
        self.transport.write(&handle, &frame)?;

        match armed.wait(timeout) {
            Ok(response) => {
                tracing::debug!(command = ?cmd, status = %response.status, "response received");
                Ok(response)
            }
            Err(WaitError::Timeout) => {
                tracing::warn!(command = ?cmd, ?timeout, "command timed out");
                Err(LockError::Timeout {
                    command: cmd.code(),
                })
            }
            Err(WaitError::Released) => Err(LockError::Connection(format!(
                "link lost while waiting for response to 0x{:02X}",
                cmd.code()
            ))),
        }
    }

    fn current_handle(&self) -> Result<Arc<T::Handle>> {
        if !self.is_connected() {
            return Err(not_connected());
        }
        self.handle.lock().clone().ok_or_else(not_connected)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register a passive observer of every parsed response
    pub fn add_observer<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Response) + Send + Sync + 'static,
    {
        self.shared.router.add_observer(observer)
    }

    /// Unregister an observer
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.router.remove_observer(id)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state
    pub fn state(&self) -> SessionState {
        self.shared.link.lock().state
    }

    /// Connected or authenticated
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Authenticated with the lock
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for LockSession<T> {
    fn drop(&mut self) {
        if self.handle.get_mut().is_some() {
            self.disconnect();
        }
    }
}

/// Tears a half-built link down unless committed
struct LinkGuard<'a, T: Transport> {
    transport: &'a T,
    handle: Option<Arc<T::Handle>>,
}

impl<T: Transport> LinkGuard<'_, T> {
    fn handle(&self) -> Result<Arc<T::Handle>> {
        self.handle.clone().ok_or_else(not_connected)
    }

    fn commit(mut self) {
        self.handle = None;
    }
}

impl<T: Transport> Drop for LinkGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!("tearing down partially established link");
            if let Err(e) = self.transport.unsubscribe_notifications(&handle) {
                tracing::debug!(error = %e, "unsubscribe failed during teardown");
            }
            self.transport.disconnect(&handle);
        }
    }
}

fn not_connected() -> LockError {
    LockError::Connection("not connected to device".to_string())
}

fn expect_success(cmd: Command, response: &Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(LockError::CommandFailure {
            command: cmd.code(),
            status: response.status,
        })
    }
}

/// PIN as the 4 ASCII bytes VERIFY_KEY carries
fn encode_pin(pin: &str) -> Result<[u8; 4]> {
    match <[u8; 4]>::try_from(pin.as_bytes()) {
        Ok(bytes) if pin.is_ascii() => Ok(bytes),
        _ => Err(LockError::InvalidArgument(format!(
            "PIN must be exactly 4 ASCII characters, got {} bytes",
            pin.len()
        ))),
    }
}
