//! Protocol Module
//!
//! Defines the OmniLock wire protocol spoken over the BLE UART service.
//!
//! ## Frame Format
//!
//! ### Request Format
//! ```text
//! ┌──────┬──────┬─────────┬──────────┬─────────┬──────────────┬─────────┐
//! │ 0xAB │ 0xDE │ Len (1) │ Rand (1) │ Cmd (1) │ Data (0..N)  │ Sum (1) │
//! └──────┴──────┴─────────┴──────────┴─────────┴──────────────┴─────────┘
//! ```
//!
//! ### Commands
//! - 0x01: VERIFY_KEY  - Data: 4 ASCII PIN bytes
//! - 0x02: ERASE_KEY   - Data: empty
//! - 0x05: OPERATIONAL - Data: 1 byte (0x01 lock, 0x02 unlock)
//! - 0x06: CONFIG      - Data: device specific
//! - 0x07: HEARTBEAT   - Data: empty
//!
//! ### Response Format
//! Same framing, with a status byte ahead of the data.
//!
//! ### Status Codes
//! - 0x00: SUCCESS
//! - 0x01: FAILURE
//! - 0x02: INVALID_COMMAND
//! - 0x03: INVALID_PARAM
//! - 0x04: NOT_PAIRED
//! - 0x05: TIMEOUT
//! - 0x06: BUSY

mod command;
mod response;
pub mod codec;

pub use command::{Command, LockOperation};
pub use response::{Response, Status};
pub use codec::{
    build_frame, build_frame_with_nonce, build_response_frame, checksum, parse_frame,
    parse_request, Frame, Request,
};
