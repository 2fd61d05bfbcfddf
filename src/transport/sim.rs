//! Simulated lock
//!
//! An in-memory OmniLock that speaks the real frame format. Requests are
//! decoded with the device-side codec, answered with response frames, and
//! delivered through the registered notification callback, either inline
//! or from a helper thread when a response delay is set.
//!
//! Fault knobs: muting, per-command scripted statuses, response delay,
//! failed notification subscription and unsolicited link loss.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::protocol::{build_response_frame, parse_request, Command, LockOperation, Request, Status};
use super::{DisconnectCallback, NotificationCallback, Transport, TransportError};

/// Observable events, in the order the device saw them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Connected,
    Request { command: u8, data: Bytes },
    Responded { command: u8, status: Status },
    Disconnected,
}

/// Handle for one simulated link
#[derive(Debug)]
pub struct SimHandle {
    link_id: u64,
}

struct Link {
    id: u64,
    notify: Option<Arc<NotificationCallback>>,
    on_drop: Option<Arc<DisconnectCallback>>,
}

struct SimState {
    device_id: String,
    pin: Vec<u8>,
    link: Option<Link>,
    next_link_id: u64,
    next_nonce: u8,

    authenticated: bool,
    locked: bool,

    responsive: bool,
    muted: HashSet<u8>,
    scripted: HashMap<u8, Status>,
    response_delay: Option<Duration>,
    fail_subscribe: bool,

    events: Vec<SimEvent>,
}

/// In-memory lock device implementing `Transport`
#[derive(Clone)]
pub struct SimulatedLock {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedLock {
    /// Create a lock advertising `device_id` and accepting `pin`
    pub fn new(device_id: impl Into<String>, pin: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                device_id: device_id.into(),
                pin: pin.as_bytes().to_vec(),
                link: None,
                next_link_id: 1,
                next_nonce: 0,
                authenticated: false,
                locked: true,
                responsive: true,
                muted: HashSet::new(),
                scripted: HashMap::new(),
                response_delay: None,
                fail_subscribe: false,
                events: Vec::new(),
            })),
        }
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Stop (or resume) answering every request
    pub fn set_responsive(&self, responsive: bool) {
        self.state.lock().responsive = responsive;
    }

    /// Never answer `cmd`
    pub fn mute_command(&self, cmd: Command) {
        self.state.lock().muted.insert(cmd.code());
    }

    /// Answer the next `cmd` with `status` instead of the normal outcome
    pub fn script_status(&self, cmd: Command, status: Status) {
        self.state.lock().scripted.insert(cmd.code(), status);
    }

    /// Deliver responses from a helper thread after `delay`
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        self.state.lock().response_delay = delay;
    }

    /// Make the next notification subscription fail
    pub fn fail_next_subscribe(&self) {
        self.state.lock().fail_subscribe = true;
    }

    /// Drop the link as if the radio lost it
    ///
    /// Fires the registered unsolicited-disconnect callback.
    pub fn drop_link(&self) {
        let callback = {
            let mut state = self.state.lock();
            let Some(link) = state.link.take() else {
                return;
            };
            state.authenticated = false;
            state.events.push(SimEvent::Disconnected);
            link.on_drop
        };

        tracing::debug!("simulated link dropped");
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Push raw bytes through the notification callback
    pub fn inject_notification(&self, bytes: &[u8]) {
        let callback = self
            .state
            .lock()
            .link
            .as_ref()
            .and_then(|link| link.notify.clone());

        if let Some(callback) = callback {
            callback(bytes);
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether the bolt is thrown
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Whether a link is currently established
    pub fn is_link_up(&self) -> bool {
        self.state.lock().link.is_some()
    }

    /// Whether the device considers the current link authenticated
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().authenticated
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    /// Command bytes of every request received, in order
    pub fn requests(&self) -> Vec<u8> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                SimEvent::Request { command, .. } => Some(*command),
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Device logic
    // =========================================================================

    fn answer(state: &mut SimState, request: &Request) -> Status {
        if let Some(status) = state.scripted.remove(&request.command) {
            return status;
        }

        let Some(command) = request.command_kind() else {
            return Status::InvalidCommand;
        };

        match command {
            Command::VerifyKey => {
                state.authenticated = request.data[..] == state.pin[..];
                if state.authenticated {
                    Status::Success
                } else {
                    Status::Failure
                }
            }
            Command::Heartbeat => Status::Success,
            _ if !state.authenticated => Status::NotPaired,
            Command::EraseKey => {
                state.authenticated = false;
                Status::Success
            }
            Command::Config => Status::Success,
            Command::Operational => match request.data.first().map(|b| LockOperation::try_from(*b)) {
                Some(Ok(LockOperation::Lock)) if request.data.len() == 1 => {
                    state.locked = true;
                    Status::Success
                }
                Some(Ok(LockOperation::Unlock)) if request.data.len() == 1 => {
                    state.locked = false;
                    Status::Success
                }
                _ => Status::InvalidParam,
            },
        }
    }
}

impl Transport for SimulatedLock {
    type Handle = SimHandle;

    fn connect(&self, device_id: &str, _timeout: Duration) -> Result<SimHandle, TransportError> {
        let mut state = self.state.lock();
        if device_id != state.device_id {
            return Err(TransportError::DeviceNotFound(device_id.to_string()));
        }

        let id = state.next_link_id;
        state.next_link_id += 1;
        state.link = Some(Link {
            id,
            notify: None,
            on_drop: None,
        });
        state.authenticated = false;
        state.events.push(SimEvent::Connected);

        Ok(SimHandle { link_id: id })
    }

    fn write(&self, handle: &SimHandle, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let notify = match state.link.as_ref() {
            Some(link) if link.id == handle.link_id => link.notify.clone(),
            _ => return Err(TransportError::Closed),
        };

        // the device ignores frames it cannot decode
        let Some(request) = parse_request(bytes) else {
            tracing::trace!("simulated lock dropped undecodable frame");
            return Ok(());
        };

        state.events.push(SimEvent::Request {
            command: request.command,
            data: request.data.clone(),
        });

        let status = Self::answer(&mut state, &request);
        if !state.responsive || state.muted.contains(&request.command) {
            return Ok(());
        }

        let nonce = state.next_nonce;
        state.next_nonce = state.next_nonce.wrapping_add(1);
        let frame = build_response_frame(request.command, status, &[], nonce)
            .map_err(|e| TransportError::Gatt(e.to_string()))?;

        let Some(notify) = notify else {
            return Ok(());
        };

        let delay = state.response_delay;
        match delay {
            None => {
                state.events.push(SimEvent::Responded {
                    command: request.command,
                    status,
                });
                drop(state);
                notify(&frame[..]);
            }
            Some(delay) => {
                drop(state);
                let shared = Arc::clone(&self.state);
                let command = request.command;
                thread::spawn(move || {
                    thread::sleep(delay);
                    shared
                        .lock()
                        .events
                        .push(SimEvent::Responded { command, status });
                    notify(&frame[..]);
                });
            }
        }

        Ok(())
    }

    fn subscribe_notifications(
        &self,
        handle: &SimHandle,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_subscribe) {
            return Err(TransportError::Gatt("RX characteristic not found".to_string()));
        }

        match state.link.as_mut() {
            Some(link) if link.id == handle.link_id => {
                link.notify = Some(Arc::new(callback));
                Ok(())
            }
            _ => Err(TransportError::Closed),
        }
    }

    fn unsubscribe_notifications(&self, handle: &SimHandle) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match state.link.as_mut() {
            Some(link) if link.id == handle.link_id => {
                link.notify = None;
                Ok(())
            }
            _ => Err(TransportError::Closed),
        }
    }

    fn on_unsolicited_disconnect(
        &self,
        handle: &SimHandle,
        callback: DisconnectCallback,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match state.link.as_mut() {
            Some(link) if link.id == handle.link_id => {
                link.on_drop = Some(Arc::new(callback));
                Ok(())
            }
            _ => Err(TransportError::Closed),
        }
    }

    fn disconnect(&self, handle: &SimHandle) {
        let mut state = self.state.lock();
        if state.link.as_ref().is_some_and(|link| link.id == handle.link_id) {
            state.link = None;
            state.authenticated = false;
            state.events.push(SimEvent::Disconnected);
        }
    }
}
