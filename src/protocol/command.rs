//! Command definitions
//!
//! Command codes understood by the lock, and the data byte of an
//! operational (lock/unlock) command.

use crate::error::LockError;

/// Command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Pairing / PIN authentication
    VerifyKey = 0x01,

    /// Unpairing
    EraseKey = 0x02,

    /// Lock/unlock control
    Operational = 0x05,

    /// Device configuration
    Config = 0x06,

    /// Keep-alive
    Heartbeat = 0x07,
}

impl Command {
    /// All commands, in wire-code order
    pub const ALL: [Command; 5] = [
        Command::VerifyKey,
        Command::EraseKey,
        Command::Operational,
        Command::Config,
        Command::Heartbeat,
    ];

    /// Wire code of this command
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = LockError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(Command::VerifyKey),
            0x02 => Ok(Command::EraseKey),
            0x05 => Ok(Command::Operational),
            0x06 => Ok(Command::Config),
            0x07 => Ok(Command::Heartbeat),
            _ => Err(LockError::Protocol(format!(
                "Unknown command code: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// Data byte carried by an `Operational` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LockOperation {
    Lock = 0x01,
    Unlock = 0x02,
}

impl From<LockOperation> for u8 {
    fn from(op: LockOperation) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for LockOperation {
    type Error = LockError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x01 => Ok(LockOperation::Lock),
            0x02 => Ok(LockOperation::Unlock),
            _ => Err(LockError::Protocol(format!(
                "Unknown lock operation: 0x{:02x}",
                byte
            ))),
        }
    }
}
