//! Bridge configuration

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of decimals in formatted progress strings
pub const DEFAULT_PROGRESS_PRECISION: u8 = 2;
/// Largest accepted progress precision
pub const MAX_PROGRESS_PRECISION: u8 = 6;

/// Log level applied to the `log` facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Off => write!(f, "off"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for an upload bridge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Log level (default: info)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Decimals in formatted progress strings (default: 2)
    #[serde(rename = "progress-precision", skip_serializing_if = "Option::is_none")]
    pub progress_precision: Option<u8>,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn progress_precision(mut self, precision: u8) -> Self {
        self.progress_precision = Some(precision);
        self
    }

    /// The progress precision in effect
    pub fn effective_progress_precision(&self) -> usize {
        self.progress_precision
            .unwrap_or(DEFAULT_PROGRESS_PRECISION) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(precision) = self.progress_precision {
            if precision > MAX_PROGRESS_PRECISION {
                return Err(BridgeError::config_error(format!(
                    "progress-precision must be at most {}, got {}",
                    MAX_PROGRESS_PRECISION, precision
                )));
            }
        }
        Ok(())
    }

    /// Set the maximum level of the `log` facade from this configuration
    pub fn apply_log_level(&self) {
        log::set_max_level(self.log_level.unwrap_or_default().into());
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(BridgeError::from)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BridgeError::config_error(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }
}
