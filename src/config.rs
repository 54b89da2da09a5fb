//! Configuration loading
//!
//! Layers embedded defaults, optional files and environment variables into
//! a [`MonitorConfig`].

use anyhow::{Context, Result};
use burnwatch_core::MonitorConfig;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub fn load_config(explicit: Option<&Path>) -> Result<MonitorConfig> {
    let mut builder = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/local").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        // 3. Environment variables (highest priority)
        // prefix_separator("_") keeps BURNWATCH_QUOTA__TIER working
        .add_source(
            Environment::with_prefix("BURNWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: MonitorConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Database path: CLI flag, then configuration, then `~/.burnwatch/usage.db`
pub fn resolve_db_path(flag: Option<&Path>, config: &MonitorConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".burnwatch")
        .join("usage.db")
}
