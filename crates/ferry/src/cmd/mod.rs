//! Command implementations for the ferry CLI

pub mod cursor;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use ferry_config::Config;

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("config file not found: {}", path.display());
    }
    Config::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Columns the configured schema needs from every row
pub fn expected_columns(config: &Config) -> Vec<String> {
    config
        .schema
        .expected_columns()
        .into_iter()
        .map(String::from)
        .collect()
}
