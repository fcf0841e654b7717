//! CLI presentation: text and json formatters for simulation reports and config.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

use crate::config::SignalConfig;
use crate::error::SignalError;
use crate::initiator::WaitOutcome;
use crate::simulation::{ContextRole, SimulationReport};

/// Format a section heading with bold/underline.
fn section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn role_label(role: ContextRole) -> String {
    match role {
        ContextRole::Initiator => role.as_str().cyan().to_string(),
        ContextRole::Result => role.as_str().magenta().to_string(),
        ContextRole::Provider => role.as_str().yellow().to_string(),
    }
}

fn outcome_label(outcome: &WaitOutcome) -> String {
    match outcome {
        WaitOutcome::Finished { status } => format!("{} ({})", "finished".green(), status),
        WaitOutcome::TimedOut { last_status, .. } => format!(
            "{} (last status {})",
            "timed out".yellow(),
            last_status.as_deref().unwrap_or("-")
        ),
        WaitOutcome::Unavailable => "unavailable".red().to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn format_simulation_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&section_heading(&format!("Channel {}", report.channel)));
    out.push_str("\n\n");

    let mut timeline = Table::new();
    timeline.load_preset(UTF8_BORDERS_ONLY);
    timeline.set_header(vec!["t+ms", "Context", "Event"]);
    for entry in &report.timeline {
        timeline.add_row(vec![
            entry.at_ms.to_string(),
            role_label(entry.context),
            entry.event.clone(),
        ]);
    }
    out.push_str(&timeline.to_string());
    out.push_str("\n\n");

    out.push_str(&section_heading("Summary"));
    out.push('\n');
    let mut summary = Table::new();
    summary.load_preset(UTF8_BORDERS_ONLY);
    summary.add_row(vec!["Initiator outcome".to_string(), outcome_label(&report.outcome)]);
    summary.add_row(vec![
        "Readiness observed".to_string(),
        yes_no(report.initiator.ready_observed).to_string(),
    ]);
    summary.add_row(vec![
        "Result state".to_string(),
        report.result.state.to_string(),
    ]);
    summary.add_row(vec![
        "Result status".to_string(),
        report.result.status.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    summary.add_row(vec![
        "Close requested".to_string(),
        report
            .close_requested_at_ms
            .map(|ms| format!("t+{}ms", ms))
            .unwrap_or_else(|| "never".to_string()),
    ]);
    out.push_str(&summary.to_string());
    out
}

pub fn format_simulation_json(report: &SimulationReport) -> Result<String, SignalError> {
    serde_json::to_string_pretty(report)
        .map_err(|e| SignalError::SimulationFailed(format!("Failed to render report: {}", e)))
}

/// Effective configuration as TOML, or JSON when `json` is set.
pub fn format_config(config: &SignalConfig, json: bool) -> Result<String, SignalError> {
    if json {
        return serde_json::to_string_pretty(config)
            .map_err(|e| SignalError::ConfigError(format!("Failed to render config: {}", e)));
    }
    toml::to_string_pretty(config)
        .map_err(|e| SignalError::ConfigError(format!("Failed to render config: {}", e)))
}
