//! Configuration management for the CLI.
//!
//! `~/.stratum/config.toml` holds the engine sections (`store`, `governance`,
//! `query`, `engine`, `checkpoint`) plus a `settings` section for the CLI.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stratum_engine::StratumConfig;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine configuration
    #[serde(flatten)]
    pub stratum: StratumConfig,

    /// CLI settings
    #[serde(default)]
    pub settings: Settings,
}

/// CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// REPL history size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

/// Directory holding the configuration, database and REPL history.
pub fn home() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".stratum"))
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(home()?.join("config.toml"))
    }

    /// Parse a configuration document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.stratum.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_toml(&fs::read_to_string(path)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Database path: the override, else `store.path`, else `~/.stratum/stratum.db`.
    pub fn resolve_store_path(&mut self, db: Option<PathBuf>) -> Result<PathBuf> {
        let path = match db.or_else(|| self.stratum.store.path.clone()) {
            Some(path) => path,
            None => home()?.join("stratum.db"),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.stratum.store.path = Some(path.clone());
        Ok(path)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            history_size: 1000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_history_size() -> usize {
    1000
}
