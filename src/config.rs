//! Configuration System
//!
//! Layered configuration for the transaction signal: bus sizing, transaction
//! attempt settings, and logging. Sources are merged by [`ConfigLoader`] with
//! environment variable overrides applied last.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;
mod transaction;

pub use facade::ConfigLoader;
pub use merge::merge_policy::ENV_PREFIX;
pub use transaction::{
    BusConfig, TransactionConfig, TransactionSettings, DEFAULT_CHANNEL_PREFIX,
    DEFAULT_GRACE_PERIOD_MS, DEFAULT_INITIATOR_WAIT_MS, DEFAULT_TERMINAL_STATUS,
};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Bus sizing
    #[serde(default)]
    pub bus: BusConfig,

    /// Transaction attempt settings
    #[serde(default)]
    pub transaction: TransactionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Bus(String),
    Transaction(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Bus(msg) => write!(f, "Bus: {}", msg),
            ValidationError::Transaction(msg) => write!(f, "Transaction: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SignalConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.bus.validate() {
            errors.push(ValidationError::Bus(e));
        }
        if let Err(e) = self.transaction.validate() {
            errors.push(ValidationError::Transaction(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into one error.
    pub fn ensure_valid(&self) -> Result<(), crate::error::SignalError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            crate::error::SignalError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}

/// Serializes unit tests that touch or read process environment.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
