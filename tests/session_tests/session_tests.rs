//! Tests for LockSession
//!
//! These tests verify:
//! - Connect/disconnect lifecycle and cleanup on failure
//! - PIN verification and authentication gating
//! - Lock/unlock, heartbeat, erase-key and config commands
//! - Reaction to unsolicited link loss

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use omnilock::transport::SimEvent;
use omnilock::{Command, Config, LockError, LockSession, SessionState, SimulatedLock, Status};

const DEVICE: &str = "OMNI-TEST";

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_with_pin(pin: &str) -> (SimulatedLock, LockSession<SimulatedLock>) {
    let device = SimulatedLock::new(DEVICE, "1234");
    let config = Config::builder()
        .pin(pin)
        .command_timeout_ms(300)
        .build();
    let session = LockSession::new(device.clone(), config);
    (device, session)
}

fn setup_connected() -> (SimulatedLock, LockSession<SimulatedLock>) {
    let (device, session) = setup_with_pin("1234");
    assert!(session.connect(DEVICE, Duration::from_secs(1)).unwrap());
    (device, session)
}

// =============================================================================
// Connect / Disconnect Tests
// =============================================================================

#[test]
fn test_connect() {
    let (device, session) = setup_connected();

    assert_eq!(session.state(), SessionState::Connected);
    assert!(session.is_connected());
    assert!(!session.is_authenticated());
    assert!(device.is_link_up());
}

#[test]
fn test_connect_when_already_connected() {
    let (device, session) = setup_connected();

    assert!(session.connect(DEVICE, Duration::from_secs(1)).unwrap());

    let connects = device
        .events()
        .iter()
        .filter(|e| **e == SimEvent::Connected)
        .count();
    assert_eq!(connects, 1);
}

#[test]
fn test_connect_unknown_device() {
    let (device, session) = setup_with_pin("1234");

    let result = session.connect("SOMEONE-ELSE", Duration::from_secs(1));

    assert!(matches!(result, Err(LockError::DeviceNotFound(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!device.is_link_up());
}

#[test]
fn test_connect_failure_releases_link() {
    let (device, session) = setup_with_pin("1234");
    device.fail_next_subscribe();

    let result = session.connect(DEVICE, Duration::from_secs(1));

    assert!(matches!(result, Err(LockError::Connection(_))));
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!device.is_link_up());
    assert_eq!(
        device.events(),
        vec![SimEvent::Connected, SimEvent::Disconnected]
    );

    // a later attempt succeeds
    assert!(session.connect(DEVICE, Duration::from_secs(1)).unwrap());
    assert!(session.is_connected());
}

#[test]
fn test_disconnect() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();

    session.disconnect();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.is_authenticated());
    assert!(!device.is_link_up());
}

#[test]
fn test_disconnect_is_idempotent() {
    let (device, session) = setup_connected();

    session.disconnect();
    session.disconnect();

    let disconnects = device
        .events()
        .iter()
        .filter(|e| **e == SimEvent::Disconnected)
        .count();
    assert_eq!(disconnects, 1);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn test_disconnect_without_connect() {
    let (device, session) = setup_with_pin("1234");
    session.disconnect();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(device.events().is_empty());
}

#[test]
fn test_drop_releases_link() {
    let (device, session) = setup_connected();
    drop(session);
    assert!(!device.is_link_up());
}

#[test]
fn test_unsolicited_disconnect() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();

    device.drop_link();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.is_authenticated());
    assert!(matches!(session.heartbeat(), Err(LockError::Connection(_))));

    // reconnect after the radio came back
    assert!(session.connect(DEVICE, Duration::from_secs(1)).unwrap());
    assert!(session.unlock().unwrap());
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[test]
fn test_verify_key() {
    let (device, session) = setup_connected();

    assert!(session.verify_key().unwrap());

    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(device.is_authenticated());
    assert_eq!(device.requests(), vec![Command::VerifyKey.code()]);
}

#[test]
fn test_verify_key_sends_ascii_pin() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();

    let pin_sent = device.events().into_iter().find_map(|e| match e {
        SimEvent::Request { command: 0x01, data } => Some(data),
        _ => None,
    });
    assert_eq!(pin_sent.as_deref(), Some(&b"1234"[..]));
}

#[test]
fn test_verify_key_wrong_pin() {
    let (_device, session) = setup_with_pin("0000");
    session.connect(DEVICE, Duration::from_secs(1)).unwrap();

    let result = session.verify_key();

    assert!(matches!(result, Err(LockError::Authentication(_))));
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_verify_key_requires_connection() {
    let (device, session) = setup_with_pin("1234");

    let result = session.verify_key();

    assert!(matches!(result, Err(LockError::Connection(_))));
    assert!(device.requests().is_empty());
}

#[test]
fn test_verify_key_rejects_malformed_pin_before_io() {
    for pin in ["123", "12345", "", "12é"] {
        let (device, session) = setup_with_pin(pin);
        session.connect(DEVICE, Duration::from_secs(1)).unwrap();

        let result = session.verify_key();

        assert!(matches!(result, Err(LockError::InvalidArgument(_))), "pin {:?}", pin);
        assert!(device.requests().is_empty());
    }
}

#[test]
fn test_verify_key_timeout_is_authentication_error() {
    let (device, session) = setup_connected();
    device.set_responsive(false);

    let result = session.verify_key();

    assert!(matches!(result, Err(LockError::Authentication(_))));
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_failed_verify_clears_previous_authentication() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();

    device.script_status(Command::VerifyKey, Status::Failure);
    assert!(session.verify_key().is_err());

    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_key_verified_on_replaced_link_does_not_authenticate() {
    let (device, session) = setup_connected();
    let session = Arc::new(session);

    // swap the link while the verify response is being delivered
    let weak = Arc::downgrade(&session);
    let swapped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&swapped);
    session.add_observer(move |response| {
        if response.answers(Command::VerifyKey) && !flag.swap(true, Ordering::SeqCst) {
            if let Some(session) = weak.upgrade() {
                session.disconnect();
                session.connect(DEVICE, Duration::from_secs(1)).unwrap();
            }
        }
    });

    let result = session.verify_key();

    assert!(swapped.load(Ordering::SeqCst));
    assert!(matches!(result, Err(LockError::Connection(_))));
    assert_eq!(session.state(), SessionState::Connected);

    // the new link gets its own verify before Operational
    assert!(session.lock().unwrap());
    assert_eq!(device.requests(), vec![0x01, 0x01, 0x05]);
}

// =============================================================================
// Lock Operation Tests
// =============================================================================

#[test]
fn test_lock_verifies_key_first() {
    let (device, session) = setup_connected();

    assert!(session.lock().unwrap());

    assert_eq!(
        device.requests(),
        vec![Command::VerifyKey.code(), Command::Operational.code()]
    );
    assert!(device.is_locked());
    assert!(session.is_authenticated());
}

#[test]
fn test_unlock() {
    let (device, session) = setup_connected();
    assert!(device.is_locked());

    assert!(session.unlock().unwrap());

    assert!(!device.is_locked());
}

#[test]
fn test_second_operation_skips_verify() {
    let (device, session) = setup_connected();

    session.unlock().unwrap();
    session.lock().unwrap();

    assert_eq!(
        device.requests(),
        vec![
            Command::VerifyKey.code(),
            Command::Operational.code(),
            Command::Operational.code(),
        ]
    );
}

#[test]
fn test_lock_with_wrong_pin_never_sends_operational() {
    let (device, session) = setup_with_pin("9999");
    session.connect(DEVICE, Duration::from_secs(1)).unwrap();

    let result = session.lock();

    assert!(matches!(result, Err(LockError::Authentication(_))));
    assert_eq!(device.requests(), vec![Command::VerifyKey.code()]);
    assert!(device.is_locked());
}

#[test]
fn test_lock_with_malformed_pin_is_authentication_error() {
    let (device, session) = setup_with_pin("12");
    session.connect(DEVICE, Duration::from_secs(1)).unwrap();

    let result = session.unlock();

    assert!(matches!(result, Err(LockError::Authentication(_))));
    assert!(device.requests().is_empty());
}

#[test]
fn test_lock_when_disconnected() {
    let (device, session) = setup_with_pin("1234");

    assert!(matches!(session.lock(), Err(LockError::Connection(_))));
    assert!(device.requests().is_empty());
}

#[test]
fn test_lock_refused() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();
    device.script_status(Command::Operational, Status::Busy);

    assert!(!session.lock().unwrap());
    assert!(session.is_authenticated());
}

#[test]
fn test_not_paired_drops_authentication() {
    let (device, session) = setup_connected();
    session.verify_key().unwrap();
    device.script_status(Command::Operational, Status::NotPaired);

    assert!(!session.unlock().unwrap());
    assert_eq!(session.state(), SessionState::Connected);

    // next operation re-verifies
    assert!(session.unlock().unwrap());
    assert_eq!(
        device.requests(),
        vec![0x01, 0x05, 0x01, 0x05]
    );
}

#[test]
fn test_reconnect_requires_new_verify() {
    let (device, session) = setup_connected();
    session.lock().unwrap();

    session.disconnect();
    session.connect(DEVICE, Duration::from_secs(1)).unwrap();
    session.lock().unwrap();

    assert_eq!(device.requests(), vec![0x01, 0x05, 0x01, 0x05]);
}

// =============================================================================
// Other Command Tests
// =============================================================================

#[test]
fn test_heartbeat_needs_no_authentication() {
    let (device, session) = setup_connected();

    session.heartbeat().unwrap();

    assert_eq!(device.requests(), vec![Command::Heartbeat.code()]);
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_heartbeat_failure_status() {
    let (device, session) = setup_connected();
    device.script_status(Command::Heartbeat, Status::Failure);

    let result = session.heartbeat();

    assert!(matches!(
        result,
        Err(LockError::CommandFailure {
            command: 0x07,
            status: Status::Failure
        })
    ));
}

#[test]
fn test_heartbeat_timeout() {
    let (device, session) = setup_connected();
    device.mute_command(Command::Heartbeat);

    let result = session.heartbeat();

    assert!(matches!(result, Err(LockError::Timeout { command: 0x07 })));
    assert!(session.is_connected());
}

#[test]
fn test_erase_key() {
    let (device, session) = setup_connected();

    session.erase_key().unwrap();

    assert_eq!(device.requests(), vec![0x01, 0x02]);
    assert_eq!(session.state(), SessionState::Connected);
    assert!(!device.is_authenticated());
}

#[test]
fn test_configure() {
    let (device, session) = setup_connected();

    let response = session.configure(&[0x10, 0x20]).unwrap();

    assert!(response.is_success());
    assert_eq!(response.command, Command::Config.code());
    assert_eq!(device.requests(), vec![0x01, 0x06]);
}

#[test]
fn test_dispatch_when_disconnected() {
    let (device, session) = setup_with_pin("1234");

    let result = session.dispatch(Command::Heartbeat, &[], Duration::from_millis(100));

    assert!(matches!(result, Err(LockError::Connection(_))));
    assert!(device.requests().is_empty());
}

#[test]
fn test_dispatch_oversized_data() {
    let (device, session) = setup_connected();

    let result = session.dispatch(Command::Config, &[0u8; 300], Duration::from_millis(100));

    assert!(matches!(result, Err(LockError::InvalidArgument(_))));
    assert!(device.requests().is_empty());
}
