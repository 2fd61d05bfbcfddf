//! Protocol codec
//!
//! Building and parsing of lock frames.
//!
//! ## Wire Format
//!
//! ### Request (outbound) Format
//! ```text
//! ┌──────┬──────┬─────────┬──────────┬─────────┬──────────────┬─────────┐
//! │ 0xAB │ 0xDE │ Len (1) │ Rand (1) │ Cmd (1) │ Data (0..N)  │ Sum (1) │
//! └──────┴──────┴─────────┴──────────┴─────────┴──────────────┴─────────┘
//! ```
//!
//! ### Response (inbound) Format
//! ```text
//! ┌──────┬──────┬─────────┬──────────┬─────────┬────────────┬─────────────┬─────────┐
//! │ 0xAB │ 0xDE │ Len (1) │ Rand (1) │ Cmd (1) │ Status (1) │ Data (0..N) │ Sum (1) │
//! └──────┴──────┴─────────┴──────────┴─────────┴────────────┴─────────────┴─────────┘
//! ```
//!
//! - Requests carry `Len = len(Data) + 4`, i.e. `len(frame) - 2`.
//! - Locks in the field count `Len` two ways: the bytes after `Len`
//!   (`len(frame) - 3`), or one more than a request of the same size
//!   (`len(frame) - 1`).
//! - `Sum` is the XOR of every byte from `Rand` through the end of the
//!   payload, so folding `Rand..=Sum` nets to zero for a valid frame.
//!
//! ### Length check
//!
//! `Len` is not covered by the checksum, so a corrupted `Len` is only caught
//! if it lands on a value the parser refuses. `parse_frame` always accepts
//! `len(frame) - 2` plus exactly one lock convention: the one two or more
//! bits away from it.
//!
//! | `len(frame)` | accepted `Len`                          |
//! |--------------|-----------------------------------------|
//! | odd          | `len(frame) - 2`, `len(frame) - 1`      |
//! | even         | `len(frame) - 2`, `len(frame) - 3`      |
//!
//! Any single-bit flip of a built request therefore fails to parse.
//!
//! Parsing never fails loudly: malformed or partial notifications are
//! transport noise and come back as `None`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{LockError, Result};
use super::{Command, Response, Status};

/// Start-of-frame marker
pub const STX: [u8; 2] = [0xAB, 0xDE];

/// Bytes preceding the checksummed region: STX (2) + LEN (1)
pub const HEADER_SIZE: usize = 3;

/// Smallest frame `parse_frame` accepts
pub const MIN_FRAME_SIZE: usize = 6;

/// Largest data section a request can carry (LEN is one byte)
pub const MAX_DATA_SIZE: usize = u8::MAX as usize - REQUEST_LEN_OVERHEAD;

/// `Len` minus `len(Data)` on a request frame
const REQUEST_LEN_OVERHEAD: usize = 4;

/// Bytes in a response frame besides its data
const RESPONSE_OVERHEAD: usize = 7;

/// An outbound frame, ready for a transport write
pub type Frame = Bytes;

// =============================================================================
// Checksum
// =============================================================================

/// XOR-fold a byte slice
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Build a request frame with a fresh random `Rand` byte
pub fn build_frame(cmd: Command, data: &[u8]) -> Result<Frame> {
    build_frame_with_nonce(cmd, data, rand::random::<u8>())
}

/// Build a request frame with a caller-chosen `Rand` byte
///
/// Fails with `InvalidArgument` when `data` does not fit the one-byte
/// length field.
pub fn build_frame_with_nonce(cmd: Command, data: &[u8], nonce: u8) -> Result<Frame> {
    if data.len() > MAX_DATA_SIZE {
        return Err(LockError::InvalidArgument(format!(
            "Frame data too large: {} bytes (max {})",
            data.len(),
            MAX_DATA_SIZE
        )));
    }

    let len_field = data.len() + REQUEST_LEN_OVERHEAD;
    Ok(encode(len_field as u8, cmd.code(), None, data, nonce))
}

/// A request decoded on the device side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw command byte
    pub command: u8,

    /// Everything between the command byte and the checksum
    pub data: Bytes,
}

impl Request {
    /// The command, if it is one we know
    pub fn command_kind(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }
}

/// Decode an outbound (request) frame
///
/// Same marker and checksum checks as `parse_frame`, but only the request
/// length convention is accepted.
pub fn parse_request(bytes: &[u8]) -> Option<Request> {
    if !is_valid(bytes) || bytes[2] as usize + 2 != bytes.len() {
        return None;
    }

    Some(Request {
        command: bytes[4],
        data: Bytes::copy_from_slice(&bytes[5..bytes.len() - 1]),
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Build an inbound (response) frame, as the lock would send it
///
/// Used by simulated devices and tests; the status is folded in as the
/// first payload byte. `Len` follows whichever lock convention
/// `parse_frame` accepts at the resulting frame length.
pub fn build_response_frame(command: u8, status: Status, data: &[u8], nonce: u8) -> Result<Frame> {
    let max = u8::MAX as usize + 1 - RESPONSE_OVERHEAD;
    if data.len() > max {
        return Err(LockError::InvalidArgument(format!(
            "Response data too large: {} bytes (max {})",
            data.len(),
            max
        )));
    }

    let frame_len = data.len() + RESPONSE_OVERHEAD;
    let len_field = if frame_len % 2 == 1 {
        frame_len - 1
    } else {
        frame_len - 3
    };
    Ok(encode(len_field as u8, command, Some(status.into()), data, nonce))
}

/// Parse a response frame
///
/// Returns `None` for buffers shorter than `MIN_FRAME_SIZE`, a wrong start
/// marker, a `Len` the length check refuses, or a checksum
/// that does not fold to zero. Frames of 6 or 7 bytes carry no data.
pub fn parse_frame(bytes: &[u8]) -> Option<Response> {
    if !is_valid(bytes) {
        return None;
    }

    let command = bytes[4];
    let status = Status::from(bytes[5]);
    let data = if bytes.len() > 7 {
        Bytes::copy_from_slice(&bytes[6..bytes.len() - 1])
    } else {
        Bytes::new()
    };

    Some(Response {
        command,
        status,
        data,
    })
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Shared frame validation: size, marker, length, checksum
fn is_valid(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_FRAME_SIZE {
        return false;
    }

    if bytes[..2] != STX {
        return false;
    }

    if !accepts_len(bytes[2], bytes.len()) {
        return false;
    }

    checksum(&bytes[HEADER_SIZE..]) == 0
}

/// Whether `declared` is an acceptable `Len` for a `frame_len`-byte frame
fn accepts_len(declared: u8, frame_len: usize) -> bool {
    let declared = declared as usize;
    let lock_convention = if frame_len % 2 == 1 {
        frame_len - 1
    } else {
        frame_len - 3
    };
    declared + 2 == frame_len || declared == lock_convention
}

/// Lay out `STX LEN RAND CMD [STATUS] DATA SUM`
fn encode(len_field: u8, command: u8, status: Option<u8>, data: &[u8], nonce: u8) -> Frame {
    let mut frame = BytesMut::with_capacity(HEADER_SIZE + data.len() + 4);
    frame.put_slice(&STX);
    frame.put_u8(len_field);
    frame.put_u8(nonce);
    frame.put_u8(command);
    if let Some(status) = status {
        frame.put_u8(status);
    }
    frame.put_slice(data);

    let sum = checksum(&frame[HEADER_SIZE..]);
    frame.put_u8(sum);

    frame.freeze()
}
