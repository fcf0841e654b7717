//! Config loader facade: layers defaults, files, and environment.

use std::path::{Path, PathBuf};

use config::{ConfigError, File};

use crate::config::merge::merge_policy;
use crate::config::sources::{global_file, workspace_file};
use crate::config::SignalConfig;

/// Loads [`SignalConfig`] from the configured source stack.
///
/// Precedence (lowest to highest): built-in defaults, global file, workspace
/// `config/config.toml`, workspace `config/{TXN_SIGNAL_ENV}.toml`, environment.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(workspace_root: &Path) -> Result<SignalConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    /// Load from one explicit file, skipping global and workspace sources.
    pub fn load_from_file(path: &Path) -> Result<SignalConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
