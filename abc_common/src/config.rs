//! Startup configuration plumbing.
//!
//! A configuration type is plain `serde` data plus a [`Validate`] impl;
//! [`ConfigLoader`] then parses TOML and validates in one step, so a value
//! that escapes the loader has already passed its semantic checks. Any
//! error here is fatal at startup.
//!
//! ```rust,no_run
//! use abc_common::config::{ConfigError, ConfigLoader, LoggingConfig, Validate};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct Tool {
//!     #[serde(default)]
//!     logging: LoggingConfig,
//!     dt: f64,
//! }
//!
//! impl Validate for Tool {
//!     fn validate(&self) -> Result<(), ConfigError> {
//!         if self.dt > 0.0 {
//!             Ok(())
//!         } else {
//!             Err(ConfigError::ValidationError("dt must be positive".into()))
//!         }
//!     }
//! }
//!
//! let tool = Tool::load(Path::new("config/abc.toml"))?;
//! println!("log level {:?}", tool.logging.level);
//! # Ok::<(), ConfigError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File exists but could not be read.
    #[error("Failed to read {}: {reason}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// OS error text.
        reason: String,
    },

    /// TOML syntax or schema mismatch.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Parsed, but semantically invalid.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log verbosity, spelled lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Numeric debug prints.
    Debug,
    /// Lifecycle and commands.
    #[default]
    Info,
    /// Clamps and rejected commands.
    Warn,
    /// Fatal startup failures only.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// `[logging]` section: how the binary installs its subscriber.
///
/// ```toml
/// [logging]
/// level = "debug"
/// json = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base filter level; `RUST_LOG` directives still apply on top.
    #[serde(default)]
    pub level: LogLevel,
    /// Emit JSON lines instead of the compact format.
    #[serde(default)]
    pub json: bool,
}

/// Semantic checks run after parsing.
pub trait Validate {
    /// Reject values that parse but cannot be used.
    fn validate(&self) -> Result<(), ConfigError>;
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Parse-and-validate entry points, blanket-implemented for every
/// deserializable [`Validate`] type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned + Validate {
    /// Read, parse and validate a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::load_str(&content)
    }

    /// Parse and validate TOML text.
    fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl<T: serde::de::DeserializeOwned + Validate> ConfigLoader for T {}
