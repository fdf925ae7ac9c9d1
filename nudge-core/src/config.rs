//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/nudge/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/nudge/` (~/.config/nudge/)
//! - Data: `$XDG_DATA_HOME/nudge/` (~/.local/share/nudge/)
//! - State/Logs: `$XDG_STATE_HOME/nudge/` (~/.local/state/nudge/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Learning store limits
    #[serde(default)]
    pub learning: LearningConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capacity and retention settings for learned data.
///
/// Signal thresholds are fixed constants in [`crate::signals`]; only storage
/// limits are tunable.
#[derive(Debug, Deserialize, Clone)]
pub struct LearningConfig {
    /// Maximum calendar selection records kept (oldest dropped first)
    #[serde(default = "default_max_selection_records")]
    pub max_selection_records: usize,

    /// Records and title preferences older than this are evicted on cleanup
    #[serde(default = "default_selection_expiry_days")]
    pub selection_expiry_days: i64,

    /// Feedback events kept when the log is bulk-trimmed
    #[serde(default = "default_feedback_log_limit")]
    pub feedback_log_limit: usize,

    /// Recent tasks rendered into the prompt context
    #[serde(default = "default_recent_task_limit")]
    pub recent_task_limit: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_selection_records: default_max_selection_records(),
            selection_expiry_days: default_selection_expiry_days(),
            feedback_log_limit: default_feedback_log_limit(),
            recent_task_limit: default_recent_task_limit(),
        }
    }
}

impl LearningConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_selection_records == 0 {
            return Err(Error::Config(
                "learning.max_selection_records must be greater than 0".to_string(),
            ));
        }
        if self.selection_expiry_days <= 0 {
            return Err(Error::Config(
                "learning.selection_expiry_days must be greater than 0".to_string(),
            ));
        }
        if self.selection_expiry_days > MAX_SELECTION_EXPIRY_DAYS {
            return Err(Error::Config(format!(
                "learning.selection_expiry_days must be at most {}",
                MAX_SELECTION_EXPIRY_DAYS
            )));
        }
        if self.feedback_log_limit == 0 {
            return Err(Error::Config(
                "learning.feedback_log_limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upper bound for `selection_expiry_days` (about a century).
pub const MAX_SELECTION_EXPIRY_DAYS: i64 = 36_500;

fn default_max_selection_records() -> usize {
    500
}

fn default_selection_expiry_days() -> i64 {
    180
}

fn default_feedback_log_limit() -> usize {
    1000
}

fn default_recent_task_limit() -> usize {
    3
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.learning.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/nudge/config.toml` (~/.config/nudge/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("nudge").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/nudge/` (~/.local/share/nudge/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("nudge")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/nudge/` (~/.local/state/nudge/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("nudge")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/nudge/data.db` (~/.local/share/nudge/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/nudge/nudge.log` (~/.local/state/nudge/nudge.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("nudge.log")
    }
}
