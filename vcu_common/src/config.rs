//! Configuration file loading for the VCU.
//!
//! The control unit reads one TOML file. [`ConfigLoader`] turns it into any
//! deserializable config struct; [`SharedConfig`] is the `[shared]` table
//! naming the unit and its default log verbosity.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config file not found")]
    FileNotFound,

    #[error("config file unreadable: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Default verbosity when neither `--verbose` nor `RUST_LOG` is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// The `[shared]` table.
///
/// ```toml
/// [shared]
/// service_name = "vcu-bench-01"
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Unit identifier, logged at boot.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_service_name() -> String {
    "vcu".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: LogLevel::default(),
        }
    }
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable config.
///
/// Only syntax and types are checked here; callers run `validate()`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound,
            _ => ConfigError::Io(e.to_string()),
        })?;
        Self::load_str(&content)
    }

    fn load_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
