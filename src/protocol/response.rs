//! Response definitions
//!
//! Represents responses decoded from lock notifications.

use std::fmt;

use bytes::Bytes;

use super::Command;

/// Response status codes
///
/// Codes outside the documented set are kept as `Unknown` rather than
/// rejected; the checksum already vouches for the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failure,
    InvalidCommand,
    InvalidParam,
    NotPaired,
    Timeout,
    Busy,
    Unknown(u8),
}

impl Status {
    /// True only for `Success`
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<u8> for Status {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Status::Success,
            0x01 => Status::Failure,
            0x02 => Status::InvalidCommand,
            0x03 => Status::InvalidParam,
            0x04 => Status::NotPaired,
            0x05 => Status::Timeout,
            0x06 => Status::Busy,
            other => Status::Unknown(other),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        match status {
            Status::Success => 0x00,
            Status::Failure => 0x01,
            Status::InvalidCommand => 0x02,
            Status::InvalidParam => 0x03,
            Status::NotPaired => 0x04,
            Status::Timeout => 0x05,
            Status::Busy => 0x06,
            Status::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
            Status::InvalidCommand => "INVALID_COMMAND",
            Status::InvalidParam => "INVALID_PARAM",
            Status::NotPaired => "NOT_PAIRED",
            Status::Timeout => "TIMEOUT",
            Status::Busy => "BUSY",
            Status::Unknown(_) => "UNKNOWN",
        };
        write!(f, "{} (0x{:02X})", name, u8::from(*self))
    }
}

/// A response decoded from one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Raw command byte echoed by the lock
    pub command: u8,

    /// Status code
    pub status: Status,

    /// Payload following the status byte (empty for short frames)
    pub data: Bytes,
}

impl Response {
    /// Create a response
    pub fn new(command: u8, status: Status, data: impl Into<Bytes>) -> Self {
        Self {
            command,
            status,
            data: data.into(),
        }
    }

    /// The echoed command, if it is one we know
    pub fn command_kind(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    /// Whether the lock reported `Success`
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether this response answers `cmd`
    pub fn answers(&self, cmd: Command) -> bool {
        self.command == cmd.code()
    }
}
