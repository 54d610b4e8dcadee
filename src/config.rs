//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/telebuf/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/telebuf/` (~/.config/telebuf/)
//! - State/Logs: `$XDG_STATE_HOME/telebuf/` (~/.local/state/telebuf/)

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

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracking buffer configuration
///
/// `endpoint` is the only required field; everything else has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Delivery endpoint URL for flushed batches
    #[serde(default)]
    pub endpoint: String,

    /// Buffered events before an automatic flush (default 10, must be >= 1)
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,

    /// Name of the cross-context broadcast channel
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// HTTP request timeout in seconds (keep-alive transport)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            buffer_limit: default_buffer_limit(),
            channel_name: default_channel_name(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TrackerConfig {
    /// Create a configuration with defaults for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Validate configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Config("tracker.endpoint is required".to_string()));
        }
        if self.buffer_limit == 0 {
            return Err(Error::Config(
                "tracker.buffer_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_buffer_limit() -> usize {
    10
}

fn default_channel_name() -> String {
    "user-tracking".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    ///
    /// Fails if no config file exists, since `tracker.endpoint` has no
    /// usable default.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "no config file found at {:?}",
                config_path
            )));
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.tracker.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/telebuf/config.toml` (~/.config/telebuf/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("telebuf").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/telebuf/` (~/.local/state/telebuf/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("telebuf")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("telebuf.log")
    }
}
