//! Configuration file resolution and loading
//!
//! Config file location follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<user config dir>/mixtube/config.toml` if it exists
//! 4. No file: compiled defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name looked up in the user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve which configuration file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: user config directory
    default_config_path().filter(|path| path.exists())
}

/// `<config dir>/mixtube/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mixtube").join(CONFIG_FILE_NAME))
}

/// Load a TOML configuration, falling back to `T::default()` when no path is given
///
/// An explicitly resolved path that cannot be read or parsed is an error: a
/// typo in a config file should not silently start the host with defaults.
pub fn load_toml_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No configuration file found, using defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        warn!("Cannot read configuration file {}: {}", path.display(), e);
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;

    let config = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
