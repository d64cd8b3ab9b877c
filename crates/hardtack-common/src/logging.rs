//! Logging setup on top of tracing-subscriber

use crate::config::LoggingConfig;
use hardtack_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::EnvFilter;

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// One JSON object per event, for audit pipelines
    Json,
    Compact,
}

impl LogFormat {
    /// Unknown names fall back to `Pretty`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// EnvFilter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
    /// Append to this file instead of stdout
    pub file: Option<PathBuf>,
    /// Emit span open/close events
    pub with_spans: bool,
    /// Include source file and line
    pub with_file: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
            with_spans: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn json(self) -> Self {
        self.format(LogFormat::Json)
    }

    pub fn to_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.with_spans = true;
        self
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(section: &LoggingConfig) -> Self {
        let config = LogConfig::new()
            .level(section.level.clone())
            .format(LogFormat::parse(&section.format));
        match &section.file {
            Some(path) => config.to_file(path),
            None => config,
        }
    }
}

/// Install the global subscriber with default settings
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. Fails if a subscriber is
/// already installed or the log file cannot be opened.
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    match &config.file {
        Some(path) => {
            let file = open_log_file(path)?;
            install(&config, Mutex::new(file), false)
        }
        None => install(&config, std::io::stdout, true),
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Configuration(format!("cannot open log file {}: {}", path.display(), e)))
}

fn install<W>(config: &LogConfig, writer: W, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let span_events = if config.with_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::fmt()
        .with_env_filter(config.filter())
        .with_span_events(span_events)
        .with_target(config.with_target)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_ansi(ansi)
        .with_writer(writer);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| Error::Configuration(format!("failed to initialize logging: {}", e)))
}
