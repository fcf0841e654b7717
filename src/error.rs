//! Error types for the transaction completion signal.

use thiserror::Error;

/// Channel-level errors raised by the bus primitive and its handles.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Crate-level errors surfaced to callers and the CLI.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid channel name: {0}")]
    InvalidChannelName(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),
}

impl From<config::ConfigError> for SignalError {
    fn from(err: config::ConfigError) -> Self {
        SignalError::ConfigError(err.to_string())
    }
}
