//! Configuration management for pomotrack

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::timer::TimerConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Phase lengths and auto-start behaviour
    #[serde(default)]
    pub timer: TimerConfig,

    /// Notification method: "bell" (terminal bell), "log" (log line only), "none"
    #[serde(default = "default_notification_method")]
    pub notification_method: String,

    /// Closed ledger entries older than this are pruned at startup (default: 90)
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: u64,

    /// Ledger writes that may be queued before new ones are dropped (default: 64)
    #[serde(default = "default_ledger_queue_size")]
    pub ledger_queue_size: usize,
}

fn default_notification_method() -> String {
    "bell".to_string()
}

fn default_ledger_retention_days() -> u64 {
    90
}

fn default_ledger_queue_size() -> usize {
    crate::ledger::background::DEFAULT_QUEUE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            notification_method: default_notification_method(),
            ledger_retention_days: default_ledger_retention_days(),
            ledger_queue_size: default_ledger_queue_size(),
        }
    }
}

impl Config {
    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .timer
            .validate()
            .context("Invalid timer settings in config file")?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Get the base configuration directory (~/.pomotrack)
/// Falls back to ./.pomotrack if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".pomotrack")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".pomotrack"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the path to the logs directory
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure all required directories exist
pub fn ensure_directories() -> Result<()> {
    std::fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
    std::fs::create_dir_all(logs_dir()).context("Failed to create logs directory")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timer, TimerConfig::default());
        assert_eq!(config.notification_method, "bell");
        assert_eq!(config.ledger_retention_days, 90);
        assert_eq!(config.ledger_queue_size, 64);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.timer.focus_minutes = 50;
        config.notification_method = "log".to_string();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            notification_method = "none"

            [timer]
            long_break_minutes = 20
            "#,
        )
        .unwrap();

        assert_eq!(parsed.notification_method, "none");
        assert_eq!(parsed.timer.long_break_minutes, 20);
        assert_eq!(parsed.timer.focus_minutes, 25);
        assert_eq!(parsed.ledger_retention_days, 90);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.timer.auto_start_breaks = true;
        config.ledger_queue_size = 8;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_timer_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nsessions_before_long_break = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".pomotrack"));
    }

    #[test]
    fn test_try_config_dir() {
        // CI might not have a home dir
        if let Some(path) = try_config_dir() {
            assert!(path.ends_with(".pomotrack"));
        }
    }
}
