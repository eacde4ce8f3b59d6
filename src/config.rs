//! Application configuration
//!
//! Configuration is plain TOML. Every field has a default mirroring the
//! built-in constants, so an empty or missing file yields a working setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    ANCHOR_BACKDATE_SECS, CAPTURE_PERIOD_SECS, MAX_STREAMS, STOP_GRACE_SECS,
};
use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub capture: CaptureConfig,
    pub log: LogConfig,
}

/// Registry sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of concurrently captured streams
    pub max_streams: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_streams: MAX_STREAMS,
        }
    }
}

/// Per-stream capture timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Throughput measurement window in seconds
    pub period_secs: u64,

    /// Seconds the capture anchor is back-dated from the first data packet
    pub anchor_backdate_secs: u64,

    /// Grace period in seconds before a stopping worker is aborted
    pub stop_grace_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            period_secs: CAPTURE_PERIOD_SECS,
            anchor_backdate_secs: ANCHOR_BACKDATE_SECS,
            stop_grace_secs: STOP_GRACE_SECS,
        }
    }
}

impl CaptureConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs.max(1))
    }

    pub fn anchor_backdate(&self) -> Duration {
        Duration::from_secs(self.anchor_backdate_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs.max(1))
    }
}

/// Logging configuration consumed by the binary's subscriber setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {}: {}", path.display(), e)))
    }

    /// Load the config from the platform config directory, or defaults if absent
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Platform config file location (`<config dir>/rtp-recorder/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rtp-recorder")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = AppConfig::default();
        assert_eq!(config.registry.max_streams, MAX_STREAMS);
        assert_eq!(config.capture.period(), Duration::from_secs(5));
        assert_eq!(config.capture.anchor_backdate(), Duration::from_secs(3));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str("[capture]\nperiod_secs = 1\n").unwrap();
        assert_eq!(config.capture.period_secs, 1);
        assert_eq!(config.capture.anchor_backdate_secs, ANCHOR_BACKDATE_SECS);
        assert_eq!(config.registry.max_streams, MAX_STREAMS);
    }

    #[test]
    fn zero_period_is_clamped() {
        let config: AppConfig = toml::from_str("[capture]\nperiod_secs = 0\n").unwrap();
        assert_eq!(config.capture.period(), Duration::from_secs(1));
    }
}
