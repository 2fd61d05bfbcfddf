//! # OmniLock
//!
//! Client-side protocol driver for OmniLock BLE electronic locks:
//! - Checksummed frame codec (`0xAB 0xDE` framing, XOR checksum)
//! - PIN authentication gating lock/unlock commands
//! - Strictly one command in flight, correlated to its response
//! - Timeout and link-loss handling
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LockSession                            │
//! │      connect / verify_key / lock / unlock / disconnect      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ dispatch (exclusive)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │ PendingSlot │◀──────────┐
//!   │   (frames)  │          │ (one waiter)│           │
//!   └──────┬──────┘          └─────────────┘           │
//!          │ write                                     │ fill
//!          ▼                                           │
//!   ┌─────────────┐   notifications   ┌────────────────┴───┐
//!   │  Transport  │──────────────────▶│ NotificationRouter │──▶ observers
//!   │   (BLE)     │                   └────────────────────┘
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod transport;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LockError, Result};
pub use config::Config;
pub use protocol::{Command, LockOperation, Response, Status};
pub use session::{LockSession, ObserverId, SessionState};
pub use transport::{SimulatedLock, Transport, TransportError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of OmniLock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
