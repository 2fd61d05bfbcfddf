//! Session state
//!
//! Connection/authentication state plus the link epoch used to ignore
//! callbacks from links that were already torn down.

/// Where the session stands with the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Authenticated,
}

impl SessionState {
    /// Connected or Authenticated
    pub fn is_connected(self) -> bool {
        self != SessionState::Disconnected
    }

    /// Authenticated (implies connected)
    pub fn is_authenticated(self) -> bool {
        self == SessionState::Authenticated
    }
}

/// State guarded by the session's link mutex
#[derive(Debug)]
pub(crate) struct LinkState {
    /// Current state
    pub state: SessionState,

    /// Bumped on every connect attempt and every teardown
    pub epoch: u64,

    /// False once the link of `epoch` has gone away
    pub alive: bool,
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            epoch: 0,
            alive: false,
        }
    }

    /// Start a new link; returns its epoch
    pub fn begin(&mut self) -> u64 {
        self.epoch += 1;
        self.alive = true;
        self.epoch
    }

    /// Mark the link of `epoch` established. False if it died meanwhile.
    pub fn establish(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || !self.alive {
            return false;
        }
        self.state = SessionState::Connected;
        true
    }

    /// Unsolicited loss of the link of `epoch`. False for stale epochs.
    pub fn lose(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.alive = false;
        self.state = SessionState::Disconnected;
        true
    }

    /// Solicited teardown; stale callbacks are ignored from here on
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.alive = false;
        self.state = SessionState::Disconnected;
    }

    /// Promote or demote authentication of the link of `epoch`
    ///
    /// False (and no change) when that link is gone or was replaced.
    pub fn set_authenticated(&mut self, epoch: u64, authenticated: bool) -> bool {
        if epoch != self.epoch || !self.state.is_connected() {
            return false;
        }
        self.state = if authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Connected
        };
        true
    }
}
