//! CLI route: single route table and run context. Dispatches to library services and presentation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::channel::ChannelName;
use crate::cli::command_name;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{format_config, format_simulation_json, format_simulation_text};
use crate::config::{ConfigLoader, SignalConfig};
use crate::error::SignalError;
use crate::simulation::{run_simulation, SimulationPlan};

/// Runtime context for CLI execution: resolved configuration and where it came from.
pub struct RunContext {
    config: SignalConfig,
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, SignalError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        config.ensure_valid()?;

        Ok(Self {
            config,
            workspace_root,
            config_path,
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, SignalError> {
        let started = Instant::now();
        let name = command_name(command);
        debug!(command = name, workspace = ?self.workspace_root, config = ?self.config_path, "dispatching");
        let result = match command {
            Commands::Simulate {
                channel,
                statuses,
                interval_ms,
                initiator_delay_ms,
                grace_ms,
                wait_ms,
                format,
            } => {
                let plan = self.simulation_plan(
                    channel.as_deref(),
                    statuses,
                    *interval_ms,
                    *initiator_delay_ms,
                    *grace_ms,
                    *wait_ms,
                )?;
                self.handle_simulate(plan, *format)
            }
            Commands::Config { format } => self.handle_config(*format),
        };
        info!(
            command = name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        result
    }

    fn handle_config(&self, format: OutputFormat) -> Result<String, SignalError> {
        let rendered = format_config(&self.config, format == OutputFormat::Json)?;
        if format == OutputFormat::Json {
            return Ok(rendered);
        }
        let source = match (&self.config_path, ConfigLoader::xdg_config_path()) {
            (Some(path), _) => format!("# source: {}\n", path.display()),
            (None, Some(global)) => format!(
                "# sources: {} + {}/config\n",
                global.display(),
                self.workspace_root.display()
            ),
            (None, None) => format!("# sources: {}/config\n", self.workspace_root.display()),
        };
        Ok(format!("{}{}", source, rendered))
    }

    fn simulation_plan(
        &self,
        channel: Option<&str>,
        statuses: &[String],
        interval_ms: u64,
        initiator_delay_ms: u64,
        grace_ms: Option<u64>,
        wait_ms: Option<u64>,
    ) -> Result<SimulationPlan, SignalError> {
        let transaction = &self.config.transaction;
        let mut settings = match channel {
            Some(name) => transaction.settings_for(ChannelName::new(name)?),
            None => transaction.new_attempt()?,
        };
        if let Some(grace_ms) = grace_ms {
            settings = settings.with_grace_period(Duration::from_millis(grace_ms));
        }
        let initiator_wait = match wait_ms {
            Some(0) => {
                return Err(SignalError::ConfigError(
                    "--wait-ms must be greater than zero".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => transaction.initiator_wait(),
        };

        Ok(SimulationPlan {
            settings,
            statuses: statuses
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            interval: Duration::from_millis(interval_ms),
            initiator_delay: Duration::from_millis(initiator_delay_ms),
            initiator_wait,
            bus_capacity: self.config.bus.capacity,
        })
    }

    fn handle_simulate(
        &self,
        plan: SimulationPlan,
        format: OutputFormat,
    ) -> Result<String, SignalError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| SignalError::SimulationFailed(format!("Failed to start runtime: {}", e)))?;
        let report = runtime.block_on(run_simulation(plan))?;
        match format {
            OutputFormat::Json => format_simulation_json(&report),
            OutputFormat::Text => Ok(format_simulation_text(&report)),
        }
    }
}
