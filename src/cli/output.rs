//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::SignalError;

/// Map library errors to a string for CLI output.
pub fn map_error(e: &SignalError) -> String {
    match e {
        SignalError::ConfigError(msg) => format!("Configuration problem: {}", msg),
        SignalError::InvalidChannelName(msg) => format!("Bad --channel value: {}", msg),
        other => other.to_string(),
    }
}
