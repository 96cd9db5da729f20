//! Configuration management for winscene
//!
//! Handles loading and validation of `winscene.toml` configuration files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogConfig;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output for interactive use
    #[default]
    Pretty,
    /// JSON lines for machine consumption
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Per-category size limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Device class switches
    #[serde(default)]
    pub device: DeviceConfig,

    /// Lifecycle policy knobs
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Size limits applied by the rect check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_main_min_width")]
    pub main_min_width: u32,

    #[serde(default = "default_main_min_height")]
    pub main_min_height: u32,

    #[serde(default = "default_sub_min_width")]
    pub sub_min_width: u32,

    #[serde(default = "default_sub_min_height")]
    pub sub_min_height: u32,

    #[serde(default = "default_system_min")]
    pub system_min_width: u32,

    #[serde(default = "default_system_min")]
    pub system_min_height: u32,

    /// Upper bound for either dimension of any window
    #[serde(default = "default_max_floating_window_size")]
    pub max_floating_window_size: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            main_min_width: default_main_min_width(),
            main_min_height: default_main_min_height(),
            sub_min_width: default_sub_min_width(),
            sub_min_height: default_sub_min_height(),
            system_min_width: default_system_min(),
            system_min_height: default_system_min(),
            max_floating_window_size: default_max_floating_window_size(),
        }
    }
}

fn default_main_min_width() -> u32 {
    320
}

fn default_main_min_height() -> u32 {
    240
}

fn default_sub_min_width() -> u32 {
    160
}

fn default_sub_min_height() -> u32 {
    90
}

fn default_system_min() -> u32 {
    5
}

fn default_max_floating_window_size() -> u32 {
    2560
}

/// Device configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// PC-style free windowing; enables label/icon updates
    #[serde(default)]
    pub is_pc_window: bool,
}

/// Lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Keep the render surface of main windows across background
    #[serde(default = "default_true")]
    pub keep_snapshot_on_background: bool,

    /// Move FOREGROUND to ACTIVE when the first frame is acknowledged
    #[serde(default = "default_true")]
    pub auto_activate_on_first_frame: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            keep_snapshot_on_background: true,
            auto_activate_on_first_frame: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject limits that no window could ever satisfy
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let max = limits.max_floating_window_size;
        if max == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_floating_window_size must be positive".to_string(),
            ));
        }
        let mins = [
            ("main_min_width", limits.main_min_width),
            ("main_min_height", limits.main_min_height),
            ("sub_min_width", limits.sub_min_width),
            ("sub_min_height", limits.sub_min_height),
            ("system_min_width", limits.system_min_width),
            ("system_min_height", limits.system_min_height),
        ];
        for (name, value) in mins {
            if value > max {
                return Err(ConfigError::Invalid(format!(
                    "limits.{name} ({value}) exceeds max_floating_window_size ({max})"
                )));
            }
        }
        Ok(())
    }
}
