//! CLI parse: clap types for txn-signal. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// txn-signal CLI - cross-context transaction completion signal
#[derive(Parser, Debug)]
#[command(name = "txn-signal")]
#[command(about = "Rehearse and inspect the transaction completion signal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run both contexts in-process and print what each observed
    Simulate {
        /// Channel name (default: generated from the configured prefix)
        #[arg(long)]
        channel: Option<String>,

        /// Statuses the provider publishes, in order
        #[arg(long, value_delimiter = ',', default_values = ["payment.pending", "payment.paid"])]
        statuses: Vec<String>,

        /// Delay before each provider publish
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Open the initiator this long after the result context mounts (0 = before)
        #[arg(long, default_value_t = 0)]
        initiator_delay_ms: u64,

        /// Override the configured grace period
        #[arg(long)]
        grace_ms: Option<u64>,

        /// Override the configured initiator wait bound
        #[arg(long)]
        wait_ms: Option<u64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the effective configuration
    Config {
        /// Output format (text prints TOML)
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
