//! Transport Module
//!
//! The BLE link as seen by the protocol layer.
//!
//! ## Architecture
//! - The radio side (scan, GATT connect, characteristic discovery) lives
//!   behind the `Transport` trait and is supplied by the caller
//! - Writes go to the TX characteristic, notifications arrive from RX
//! - `SimulatedLock` is an in-memory device used for tests and dry runs

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

mod sim;

pub use sim::{SimEvent, SimHandle, SimulatedLock};

// =============================================================================
// GATT Layout (Nordic UART service)
// =============================================================================

/// UART service UUID
pub const SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// TX characteristic UUID (host writes frames here)
pub const TX_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// RX characteristic UUID (lock notifies responses here)
pub const RX_CHAR_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

// =============================================================================
// Errors and Callbacks
// =============================================================================

/// Errors reported by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Device {0} not found")]
    DeviceNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("GATT error: {0}")]
    Gatt(String),

    #[error("Link closed")]
    Closed,
}

/// Invoked once per inbound notification, with the raw characteristic value
pub type NotificationCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Invoked when the link drops without the session asking for it
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

// =============================================================================
// Transport Trait
// =============================================================================

/// A byte channel to one lock
///
/// Calls may block. Notification and disconnect callbacks may run on any
/// thread the implementation owns, including the thread inside `write`.
pub trait Transport: Send + Sync + 'static {
    /// Opaque handle for one established link
    type Handle: Send + Sync + 'static;

    /// Find the device and establish a GATT link with the UART service
    fn connect(&self, device_id: &str, timeout: Duration) -> Result<Self::Handle, TransportError>;

    /// Write one frame to the TX characteristic
    fn write(&self, handle: &Self::Handle, bytes: &[u8]) -> Result<(), TransportError>;

    /// Enable notifications on the RX characteristic
    fn subscribe_notifications(
        &self,
        handle: &Self::Handle,
        callback: NotificationCallback,
    ) -> Result<(), TransportError>;

    /// Disable notifications on the RX characteristic
    fn unsubscribe_notifications(&self, handle: &Self::Handle) -> Result<(), TransportError>;

    /// Register the callback fired on an unsolicited link loss
    fn on_unsolicited_disconnect(
        &self,
        handle: &Self::Handle,
        callback: DisconnectCallback,
    ) -> Result<(), TransportError>;

    /// Tear the link down. Must tolerate an already-dead link.
    fn disconnect(&self, handle: &Self::Handle);
}

impl<T: Transport> Transport for Arc<T> {
    type Handle = T::Handle;

    fn connect(&self, device_id: &str, timeout: Duration) -> Result<Self::Handle, TransportError> {
        (**self).connect(device_id, timeout)
    }

    fn write(&self, handle: &Self::Handle, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(handle, bytes)
    }

    fn subscribe_notifications(
        &self,
        handle: &Self::Handle,
        callback: NotificationCallback,
    ) -> Result<(), TransportError> {
        (**self).subscribe_notifications(handle, callback)
    }

    fn unsubscribe_notifications(&self, handle: &Self::Handle) -> Result<(), TransportError> {
        (**self).unsubscribe_notifications(handle)
    }

    fn on_unsolicited_disconnect(
        &self,
        handle: &Self::Handle,
        callback: DisconnectCallback,
    ) -> Result<(), TransportError> {
        (**self).on_unsolicited_disconnect(handle, callback)
    }

    fn disconnect(&self, handle: &Self::Handle) {
        (**self).disconnect(handle)
    }
}
