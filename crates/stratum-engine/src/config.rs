//! Configuration for the engine and its workers
//!
//! One TOML document configures every layer:
//!
//! ```toml
//! [store]
//! path = "/var/lib/stratum/stratum.db"
//! history_limit = 256
//!
//! [governance]
//! require_promotion_evidence = true
//!
//! [query]
//! relevance_threshold = 0.5
//!
//! [engine]
//! max_concurrent_imports = 4
//!
//! [checkpoint]
//! interval_secs = 600
//! ```
//!
//! Missing sections and keys fall back to their defaults.

use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stratum_governor::GovernanceConfig;
use stratum_query::QueryConfig;
use stratum_store::StoreConfig;

/// Import pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Imports allowed to run at once (disjoint families only)
    pub max_concurrent_imports: usize,

    /// Attempts per import when a concurrent commit makes the snapshot stale
    pub max_commit_attempts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_imports: 4,
            max_commit_attempts: 8,
        }
    }
}

/// Checkpoint worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Run the worker at all
    pub enabled: bool,

    /// How often the worker wakes up (in seconds)
    pub interval_secs: u64,

    /// Log rows that must be pending before a checkpoint is written
    pub min_pending_entries: usize,
}

impl Default for CheckpointConfig {
    /// Every 10 minutes, once at least 16 commits are pending
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
            min_pending_entries: 16,
        }
    }
}

impl CheckpointConfig {
    /// Frequent, small checkpoints (every minute, any pending commit)
    pub fn aggressive() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            min_pending_entries: 1,
        }
    }

    /// Rare, large checkpoints (hourly, 256 pending commits)
    pub fn lenient() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            min_pending_entries: 256,
        }
    }

    /// Get the wake-up interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Complete configuration document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StratumConfig {
    /// Store and persistence
    pub store: StoreConfig,

    /// Tier governance and contradiction checking
    pub governance: GovernanceConfig,

    /// Query engine
    pub query: QueryConfig,

    /// Import pipeline
    pub engine: EngineConfig,

    /// Checkpoint worker
    pub checkpoint: CheckpointConfig,
}

impl StratumConfig {
    /// Parse a TOML document
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(input).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), EngineError> {
        self.store
            .validate()
            .and_then(|_| self.governance.validate())
            .and_then(|_| self.query.validate())
            .map_err(EngineError::Config)?;

        if self.engine.max_concurrent_imports == 0 {
            return Err(EngineError::Config(
                "engine.max_concurrent_imports must be at least 1".to_string(),
            ));
        }
        if self.engine.max_commit_attempts == 0 {
            return Err(EngineError::Config(
                "engine.max_commit_attempts must be at least 1".to_string(),
            ));
        }
        if self.checkpoint.interval_secs == 0 {
            return Err(EngineError::Config(
                "checkpoint.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StratumConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.max_concurrent_imports, 4);
        assert_eq!(config.checkpoint.interval(), Duration::from_secs(600));
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_checkpoint_presets() {
        let aggressive = CheckpointConfig::aggressive();
        let lenient = CheckpointConfig::lenient();
        assert!(aggressive.interval_secs < CheckpointConfig::default().interval_secs);
        assert!(lenient.interval_secs > CheckpointConfig::default().interval_secs);
        assert_eq!(aggressive.min_pending_entries, 1);
    }

    #[test]
    fn test_partial_document() {
        let config = StratumConfig::from_toml(
            r#"
            [store]
            path = "/tmp/stratum.db"

            [query]
            max_citations = 3

            [checkpoint]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(
            config.store.path.as_deref(),
            Some(Path::new("/tmp/stratum.db"))
        );
        assert_eq!(config.query.max_citations, 3);
        assert_eq!(config.query.relevance_threshold, 0.5);
        assert!(!config.checkpoint.enabled);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_invalid_document() {
        assert!(StratumConfig::from_toml("[engine]\nmax_concurrent_imports = 0").is_err());
        assert!(StratumConfig::from_toml("[query]\nrelevance_threshold = 2.0").is_err());
        assert!(StratumConfig::from_toml("[store\n").is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StratumConfig::default();
        let rendered = config.to_toml().unwrap();
        assert_eq!(StratumConfig::from_toml(&rendered).unwrap(), config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StratumConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StratumConfig::default());
    }
}
