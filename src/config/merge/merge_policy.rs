//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

use crate::channel::DEFAULT_CAPACITY;
use crate::config::transaction::{
    DEFAULT_CHANNEL_PREFIX, DEFAULT_GRACE_PERIOD_MS, DEFAULT_INITIATOR_WAIT_MS,
    DEFAULT_TERMINAL_STATUS,
};

/// Prefix for environment overrides, e.g. `TXN_SIGNAL__TRANSACTION__TERMINAL_STATUS`.
pub const ENV_PREFIX: &str = "TXN_SIGNAL";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("bus.capacity", DEFAULT_CAPACITY as u64)?
        .set_default("transaction.channel_prefix", DEFAULT_CHANNEL_PREFIX)?
        .set_default("transaction.terminal_status", DEFAULT_TERMINAL_STATUS)?
        .set_default("transaction.grace_period_ms", DEFAULT_GRACE_PERIOD_MS)?
        .set_default("transaction.initiator_wait_ms", DEFAULT_INITIATOR_WAIT_MS)
}

/// Environment source. Applied last so it overrides every file.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
