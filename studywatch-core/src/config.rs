//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/studywatch/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/studywatch/` (~/.config/studywatch/)
//! - State/Logs: `$XDG_STATE_HOME/studywatch/` (~/.local/state/studywatch/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Study server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Polling behaviour
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Study server connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Base URL of the task API, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("server.base_url is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must start with http:// or https://, got {:?}",
                url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "server.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Milliseconds between poll ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Follow the newest log entry after each append
    #[serde(default = "default_auto_scroll")]
    pub auto_scroll: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            auto_scroll: default_auto_scroll(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config(
                "monitor.interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    crate::monitor::DEFAULT_INTERVAL.as_millis() as u64
}

fn default_auto_scroll() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.monitor.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/studywatch/config.toml` (~/.config/studywatch/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("studywatch").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/studywatch/` (~/.local/state/studywatch/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("studywatch")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/studywatch/studywatch.log` (~/.local/state/studywatch/studywatch.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("studywatch.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5000/api");
        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.monitor.interval_ms, 2000);
        assert!(config.monitor.auto_scroll);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
base_url = "https://study.example.com/api"
timeout_secs = 5

[monitor]
interval_ms = 500
auto_scroll = false

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.base_url, "https://study.example.com/api");
        assert_eq!(config.server.timeout(), Duration::from_secs(5));
        assert_eq!(config.monitor.interval(), Duration::from_millis(500));
        assert!(!config.monitor.auto_scroll);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[monitor]
interval_ms = 750
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.monitor.interval_ms, 750);
        assert!(config.monitor.auto_scroll);
        assert_eq!(config.server.base_url, default_base_url());
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            base_url: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            base_url: "ftp://study.example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_monitor_config_validation() {
        let config = MonitorConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbase_url = \"http://localhost:8080/api\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nbase_url = ").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
