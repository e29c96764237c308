//! Configuration loading.

mod config_data;
mod language;
pub mod markers;
mod templates;

use std::fs;
use std::path::Path;

pub use config_data::{Config, BUILTIN_IGNORES};
pub use language::{Comment, Language};
pub use markers::REF_PATTERN;
pub use templates::{builtin_languages, find_language};

use crate::errors::Result;
use crate::io::atomic_write;

/// Reads configuration from a TOML file.
///
/// An empty file yields the default configuration.
pub fn read_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Reads configuration, or returns the default if the file doesn't exist.
pub fn read_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        read_config_file(path)
    } else {
        Ok(Config::default())
    }
}

/// Writes configuration as pretty TOML.
pub fn write_config_file(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    atomic_write(path, content.as_bytes())?;
    Ok(())
}
