//! Configuration management for livesync
//!
//! Configuration is read from a TOML file, with environment variable
//! overrides and sensible defaults for a local InfluxDB instance.
//!
//! ```toml
//! [store]
//! url = "http://localhost:8086?db=sensors"
//! request_timeout_ms = 10000
//!
//! [sync]
//! streams = ["temperature", "humidity"]
//! tick_interval_ms = 16
//!
//! [monitoring]
//! log_level = "info"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Store connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// InfluxDB URL in the form `http://host:port?db=name`
    #[serde(default = "default_store_url")]
    pub url: String,

    /// HTTP request timeout in milliseconds (0 = no timeout)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Issue `CREATE DATABASE` when connecting
    #[serde(default = "default_true")]
    pub create_database: bool,
}

/// Synchronization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Names of the measurements to keep in sync
    #[serde(default = "default_streams")]
    pub streams: Vec<String>,

    /// Interval between polls in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dump Prometheus metrics to the log on shutdown
    #[serde(default)]
    pub metrics_on_exit: bool,
}

// Default value functions
fn default_store_url() -> String { "http://localhost:8086?db=sensors".to_string() }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_streams() -> Vec<String> { vec!["temperature".to_string(), "humidity".to_string()] }
fn default_tick_interval_ms() -> u64 { 16 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            request_timeout_ms: default_request_timeout_ms(),
            create_database: true,
        }
    }
}

impl StoreConfig {
    /// Create a config for the given URL with default settings
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Request timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            streams: default_streams(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl SyncConfig {
    /// Interval between polls
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_on_exit: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents).map_err(|e| {
            Error::Serialization(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env_overrides(&mut self) {
        // Store
        if let Ok(url) = std::env::var("LIVESYNC_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(timeout) = std::env::var("LIVESYNC_REQUEST_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.store.request_timeout_ms = t;
            }
        }

        // Sync
        if let Ok(streams) = std::env::var("LIVESYNC_STREAMS") {
            self.sync.streams = streams
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(tick) = std::env::var("LIVESYNC_TICK_MS") {
            if let Ok(t) = tick.parse() {
                self.sync.tick_interval_ms = t;
            }
        }

        // Monitoring
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.monitoring.log_level = log_level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(Error::Configuration("Store URL cannot be empty".to_string()));
        }

        if self.sync.streams.is_empty() {
            return Err(Error::Configuration(
                "At least one stream must be configured".to_string(),
            ));
        }
        if let Some(bad) = self.sync.streams.iter().find(|s| s.trim().is_empty()) {
            return Err(Error::Configuration(format!(
                "Stream names cannot be blank: {:?}",
                bad
            )));
        }
        for (i, name) in self.sync.streams.iter().enumerate() {
            if self.sync.streams[..i].contains(name) {
                return Err(Error::Configuration(format!(
                    "Stream '{}' is configured more than once",
                    name
                )));
            }
        }

        if self.sync.tick_interval_ms == 0 {
            return Err(Error::Configuration("Tick interval must be > 0".to_string()));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.url, "http://localhost:8086?db=sensors");
        assert_eq!(config.sync.streams, vec!["temperature", "humidity"]);
        assert_eq!(config.sync.tick_interval(), Duration::from_millis(16));
        assert_eq!(config.store.request_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_streams_rejected() {
        let mut config = Config::default();
        config.sync.streams = vec!["temperature".into(), "temperature".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_streams_rejected() {
        let mut config = Config::default();
        config.sync.streams.clear();
        assert!(config.validate().is_err());

        config.sync.streams = vec!["  ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        let mut config = StoreConfig::with_url("http://db:8086?db=x");
        config.request_timeout_ms = 0;
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[sync]\nstreams = [\"pressure\"]\n").unwrap();
        assert_eq!(config.sync.streams, vec!["pressure"]);
        assert_eq!(config.sync.tick_interval_ms, 16);
        assert_eq!(config.store.url, "http://localhost:8086?db=sensors");
        assert_eq!(config.monitoring.log_level, "info");
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("LIVESYNC_STREAMS", "pressure, wind ,");
        std::env::set_var("LIVESYNC_TICK_MS", "250");
        let config = Config::from_env();
        std::env::remove_var("LIVESYNC_STREAMS");
        std::env::remove_var("LIVESYNC_TICK_MS");

        assert_eq!(config.sync.streams, vec!["pressure", "wind"]);
        assert_eq!(config.sync.tick_interval_ms, 250);
    }
}
