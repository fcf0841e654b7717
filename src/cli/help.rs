//! Command-name contract used in log fields.

use crate::cli::parse::Commands;

/// Stable command name (e.g. "simulate", "config").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Simulate { .. } => "simulate",
        Commands::Config { .. } => "config",
    }
}
