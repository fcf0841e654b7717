//! Transaction and bus configuration, and the settings injected into contexts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelName, DEFAULT_CAPACITY};
use crate::error::SignalError;

pub const DEFAULT_CHANNEL_PREFIX: &str = "txn";
pub const DEFAULT_TERMINAL_STATUS: &str = "payment.paid";
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;
pub const DEFAULT_INITIATOR_WAIT_MS: u64 = 600_000;

/// Bus sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Messages buffered per topic before slow listeners start losing them
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Bus capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Transaction attempt configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Prefix for generated per-attempt channel names
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,

    /// Status value that marks a transaction as complete
    #[serde(default = "default_terminal_status")]
    pub terminal_status: String,

    /// Delay between the terminal status and the result context closing itself
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Upper bound the initiator waits for a terminal status
    #[serde(default = "default_initiator_wait_ms")]
    pub initiator_wait_ms: u64,
}

fn default_channel_prefix() -> String {
    DEFAULT_CHANNEL_PREFIX.to_string()
}

fn default_terminal_status() -> String {
    DEFAULT_TERMINAL_STATUS.to_string()
}

fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

fn default_initiator_wait_ms() -> u64 {
    DEFAULT_INITIATOR_WAIT_MS
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            channel_prefix: default_channel_prefix(),
            terminal_status: default_terminal_status(),
            grace_period_ms: default_grace_period_ms(),
            initiator_wait_ms: default_initiator_wait_ms(),
        }
    }
}

impl TransactionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.terminal_status.trim().is_empty() {
            return Err("Terminal status cannot be empty".to_string());
        }
        if self.initiator_wait_ms == 0 {
            return Err("Initiator wait must be greater than zero".to_string());
        }
        ChannelName::new(format!("{}-0", self.channel_prefix))
            .map_err(|e| format!("Invalid channel prefix '{}': {}", self.channel_prefix, e))?;
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn initiator_wait(&self) -> Duration {
        Duration::from_millis(self.initiator_wait_ms)
    }

    /// Settings for an attempt on an externally chosen channel.
    pub fn settings_for(&self, channel: ChannelName) -> TransactionSettings {
        TransactionSettings::new(channel, self.terminal_status.clone())
            .with_grace_period(self.grace_period())
    }

    /// Settings for a fresh attempt on a generated, collision-free channel.
    pub fn new_attempt(&self) -> Result<TransactionSettings, SignalError> {
        let channel = ChannelName::for_attempt(&self.channel_prefix)?;
        Ok(self.settings_for(channel))
    }
}

/// Per-attempt configuration injected into both contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSettings {
    pub channel: ChannelName,
    pub terminal_status: String,
    pub grace_period: Duration,
}

impl TransactionSettings {
    pub fn new(channel: ChannelName, terminal_status: impl Into<String>) -> Self {
        Self {
            channel,
            terminal_status: terminal_status.into(),
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}
