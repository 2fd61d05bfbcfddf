//! Error types for OmniLock
//!
//! Provides a unified error type for all session operations.

use thiserror::Error;

use crate::protocol::Status;
use crate::transport::TransportError;

/// Result type alias using LockError
pub type Result<T> = std::result::Result<T, LockError>;

/// Unified error type for OmniLock operations
#[derive(Debug, Error)]
pub enum LockError {
    // -------------------------------------------------------------------------
    // Link Errors
    // -------------------------------------------------------------------------
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    // -------------------------------------------------------------------------
    // Authentication Errors
    // -------------------------------------------------------------------------
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Command 0x{command:02X} timed out")]
    Timeout { command: u8 },

    #[error("Command 0x{command:02X} failed (status: {status})")]
    CommandFailure { command: u8, status: Status },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TransportError> for LockError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::DeviceNotFound(id) => LockError::DeviceNotFound(id),
            other => LockError::Connection(other.to_string()),
        }
    }
}
