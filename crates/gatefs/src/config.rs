//! TOML-based configuration for the gateway.
//!
//! Every field has a default so an empty (or missing) file yields a working
//! configuration; the allowed-directory list is the only thing a deployment
//! must supply, either here or on the command line.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("log format must be \"text\" or \"json\"; got {0}")]
    InvalidLogFormat(String),

    #[error("max_file_size must be greater than 0")]
    InvalidMaxFileSize,

    #[error("max_batch must be greater than 0")]
    InvalidMaxBatch,

    #[error("max_depth must be greater than 0")]
    InvalidMaxDepth,
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub directories: DirectoriesConfig,
    pub limits: LimitsConfig,
    pub logging: LogConfig,
}

/// Allowed roots and symlink policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    /// Directories the server may operate under, in report order.
    pub allowed: Vec<PathBuf>,
    /// When false, operations act on symlinks themselves; escaping targets
    /// are rejected either way.
    pub follow_symlinks: bool,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            allowed: Vec::new(),
            follow_symlinks: true,
        }
    }
}

/// Resource ceilings, immutable after startup.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes for a single read or write.
    pub max_file_size: u64,
    /// Maximum targets per batch request.
    pub max_batch: usize,
    /// Default recursion bound for tree and search operations.
    pub max_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_batch: 64,
            max_depth: 10,
        }
    }
}

/// Logging configuration. Stdout belongs to the MCP protocol, so output
/// goes to stderr or to the configured file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of: trace, debug, info, warn, error.
    pub level: String,
    /// "text" or "json".
    pub format: String,
    /// Append-mode log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            file: None,
        }
    }
}

impl GatewayConfig {
    /// Parse a TOML configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field-level constraints that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidLogFormat(self.logging.format.clone()));
        }
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::InvalidMaxFileSize);
        }
        if self.limits.max_batch == 0 {
            return Err(ConfigError::InvalidMaxBatch);
        }
        if self.limits.max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_parses_with_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert!(config.directories.allowed.is_empty());
        assert!(config.directories.follow_symlinks);
        assert_eq!(config.limits.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.limits.max_batch, 64);
        assert_eq!(config.limits.max_depth, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn directories_only_toml_parses() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [directories]
            allowed = ["/srv/data", "/srv/shared"]
            follow_symlinks = false
            "#,
        )
        .unwrap();
        assert_eq!(
            config.directories.allowed,
            vec![PathBuf::from("/srv/data"), PathBuf::from("/srv/shared")]
        );
        assert!(!config.directories.follow_symlinks);
        assert_eq!(config.limits.max_batch, 64);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [logging]
            level = "verbose"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".into()))
        );
    }

    #[test]
    fn rejects_zero_limits() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [limits]
            max_file_size = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxFileSize));
    }
}
