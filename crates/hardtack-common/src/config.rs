//! Configuration management for Hardtack components

use hardtack_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Compliance engine settings
    #[serde(default)]
    pub engine: EngineSection,

    /// Adapter retry settings
    #[serde(default)]
    pub retry: RetrySection,

    /// Rule catalog loading
    #[serde(default)]
    pub catalog: CatalogSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (HARDTACK_ prefix)
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(val) = std::env::var("HARDTACK_MAX_CONCURRENT_DEVICES") {
            self.engine.max_concurrent_devices = parse_env("HARDTACK_MAX_CONCURRENT_DEVICES", &val)?;
        }
        if let Ok(val) = std::env::var("HARDTACK_OPERATION_TIMEOUT_MS") {
            self.engine.operation_timeout_ms = parse_env("HARDTACK_OPERATION_TIMEOUT_MS", &val)?;
        }
        if let Ok(val) = std::env::var("HARDTACK_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env("HARDTACK_RETRY_MAX_ATTEMPTS", &val)?;
        }
        if let Ok(val) = std::env::var("HARDTACK_CATALOG_DIR") {
            self.catalog.dir = Some(val);
        }
        if let Ok(val) = std::env::var("HARDTACK_CATALOG_STRICT") {
            self.catalog.strict = parse_env("HARDTACK_CATALOG_STRICT", &val)?;
        }

        // Logging
        if let Ok(val) = std::env::var("HARDTACK_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("HARDTACK_LOG_FORMAT") {
            self.logging.format = val;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent_devices == 0 {
            return Err(Error::InvalidConfig {
                key: "engine.max_concurrent_devices".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.engine.operation_timeout_ms == 0 {
            return Err(Error::InvalidConfig {
                key: "engine.operation_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig {
                key: "retry.max_attempts".into(),
                message: "must be at least 1 (1 disables retries)".into(),
            });
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::InvalidConfig {
                key: "retry.multiplier".into(),
                message: "must be >= 1.0".into(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    val.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Maximum devices worked on at the same time
    #[serde(default = "default_max_devices")]
    pub max_concurrent_devices: usize,

    /// Timeout for a single adapter read or write in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

fn default_max_devices() -> usize {
    8
}

fn default_operation_timeout() -> u64 {
    5000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_concurrent_devices: 8,
            operation_timeout_ms: 5000,
        }
    }
}

/// Retry settings for transient adapter failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Add random jitter of up to half the delay
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    5000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Rule catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Directory of JSON rule files, e.g. /etc/hardtack/rules
    #[serde(default)]
    pub dir: Option<String>,

    /// Abort loading on the first malformed file
    #[serde(default)]
    pub strict: bool,

    /// Seed the catalog with the built-in baseline rules
    #[serde(default = "default_true")]
    pub include_builtin: bool,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            dir: None,
            strict: false,
            include_builtin: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log file path (optional)
    pub file: Option<String>,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("pretty"),
            file: None,
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn max_concurrent_devices(mut self, n: usize) -> Self {
        self.config.engine.max_concurrent_devices = n;
        self
    }

    pub fn operation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.engine.operation_timeout_ms = ms;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn catalog_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.catalog.dir = Some(dir.into());
        self
    }

    pub fn strict_catalog(mut self, strict: bool) -> Self {
        self.config.catalog.strict = strict;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
