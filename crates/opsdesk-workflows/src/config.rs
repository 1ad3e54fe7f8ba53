//! Engine configuration
//!
//! Layered the usual way: built-in defaults, then an optional TOML file, then
//! `OPSDESK_`-prefixed environment variables (`OPSDESK_RETRY__MAX_ATTEMPTS=5`).

use crate::parameters::ParameterDefaults;
use crate::retry::RetryPolicy;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File or environment could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Values are out of range
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("opsdesk")
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Independent tasks of one instance allowed to run at once
    pub max_parallel_tasks: usize,
    /// License assigned when onboarding omits `licenseId`
    pub default_license_id: Option<String>,
    /// Archive destination when offboarding names none
    pub default_archive_destination: Option<String>,
    /// Root directory for persisted instances and the audit log
    pub state_dir: PathBuf,
    /// Retry and timeout policy for directory calls
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: 1,
            default_license_id: None,
            default_archive_destination: Some("compliance-archive".to_string()),
            state_dir: default_state_dir(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Fallbacks for optional start parameters
    pub fn parameter_defaults(&self) -> ParameterDefaults {
        ParameterDefaults {
            license_id: self.default_license_id.clone(),
            archive_destination: self.default_archive_destination.clone(),
        }
    }

    /// Directory of persisted instance documents
    pub fn workflows_dir(&self) -> PathBuf {
        self.state_dir.join("workflows")
    }

    /// Path of the JSON-lines audit log
    pub fn audit_log_path(&self) -> PathBuf {
        self.state_dir.join("audit.jsonl")
    }

    /// Check values are in range
    pub fn validate(&self) -> ConfigResult<()> {
        self.retry.validate().map_err(ConfigError::Validation)?;
        if self.max_parallel_tasks == 0 {
            return Err(ConfigError::Validation(
                "max_parallel_tasks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Manager reading the default config file
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Manager reading a specific config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "OPSDESK".to_string(),
        }
    }

    /// Override the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("opsdesk")
            .join("config.toml")
    }

    /// Config file this manager reads
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate configuration
    pub fn load(&self) -> ConfigResult<EngineConfig> {
        let config = Config::builder()
            .add_source(File::from(self.config_path.clone()).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let engine_config: EngineConfig = config.try_deserialize()?;
        engine_config.validate()?;
        Ok(engine_config)
    }

    /// Write configuration as TOML
    pub fn save(&self, config: &EngineConfig) -> ConfigResult<()> {
        config.validate()?;
        let toml = toml::to_string(config)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_path, toml)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ConfigManager {
        ConfigManager::with_path(dir.path().join("config.toml"))
            .with_env_prefix("OPSDESK_CONFIG_TEST_UNUSED")
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.max_parallel_tasks, 1);
        assert_eq!(
            config.parameter_defaults().archive_destination.as_deref(),
            Some("compliance-archive")
        );
        assert!(config.validate().is_ok());
        assert!(config.audit_log_path().ends_with("audit.jsonl"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = manager(&dir).load().unwrap();
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_file_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "max_parallel_tasks = 4\ndefault_license_id = \"M365-E5\"\n\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = manager(&dir).load().unwrap();
        assert_eq!(config.max_parallel_tasks, 4);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.default_license_id.as_deref(), Some("M365-E5"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let mut config = EngineConfig::default();
        config.state_dir = dir.path().join("state");
        config.retry = RetryPolicy::new(7, 100);

        manager.save(&config).unwrap();
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_saved_file_has_only_engine_settings() {
        let text = toml::to_string(&EngineConfig::default()).unwrap();
        let table: toml::Table = text.parse().unwrap();
        let mut keys: Vec<_> = table.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["default_archive_destination", "max_parallel_tasks", "retry", "state_dir"]
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "max_parallel_tasks = 0\n").unwrap();
        assert!(matches!(
            manager(&dir).load(),
            Err(ConfigError::Validation(_))
        ));

        let mut config = EngineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
