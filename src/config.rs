//! Configuration for OmniLock sessions
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

/// Main configuration for a lock session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------
    /// PIN sent with VERIFY_KEY; must be exactly 4 ASCII characters
    pub pin: String,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Device discovery + GATT connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Time to wait for a response to one command (milliseconds)
    pub command_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pin: "1234".to_string(),
            connect_timeout_ms: 10_000,
            command_timeout_ms: 5_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Command timeout as a `Duration`
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the PIN
    pub fn pin(mut self, pin: impl Into<String>) -> Self {
        self.config.pin = pin.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the per-command response timeout (in milliseconds)
    pub fn command_timeout_ms(mut self, ms: u64) -> Self {
        self.config.command_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
