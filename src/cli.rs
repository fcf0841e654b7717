//! CLI domain: parse, route, help, output, and presentation only.
//! No signal logic lives here; the route table dispatches to library services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{format_config, format_simulation_json, format_simulation_text};
pub use route::RunContext;
