//! Logging configuration and initialization
//!
//! rectcheck logs through `tracing`. This module installs a
//! `tracing-subscriber` registry with a console layer (human or JSON) and an
//! optional JSON file layer.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., "info", "debug,rectcheck=trace");
//!   takes precedence over the configured level
//! - `RECTCHECK_LOG_LEVEL`: Simple log level (error, warn, info, debug, trace)
//! - `RECTCHECK_LOG_FORMAT`: Console format ("human" or "json")
//! - `RECTCHECK_LOG_FILE`: Optional file path for JSON log output

use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Set once a subscriber has been installed by this module
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

pub const LOG_LEVEL_ENV: &str = "RECTCHECK_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "RECTCHECK_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "RECTCHECK_LOG_FILE";

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to open log file {path}: {reason}")]
    FileOpenFailed { path: PathBuf, reason: String },

    /// Another global subscriber is already installed
    #[error("failed to install subscriber: {0}")]
    SubscriberInit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Ok(LogFormat::Human),
            "json" | "structured" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file/line in console output
    pub with_file_info: bool,
    /// Emit span close events
    pub with_span_events: bool,
    /// Additional JSON output file
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Build a configuration from the `RECTCHECK_LOG_*` variables.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = LoggingConfig::new();
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Ok(file) = std::env::var(LOG_FILE_ENV) {
            if !file.trim().is_empty() {
                config.log_file = Some(PathBuf::from(file));
            }
        }
        Ok(config)
    }
}

/// Initialize logging from the environment, ignoring failures.
///
/// Idempotent; intended for binaries and tests that just want output.
pub fn init_logging_default() {
    if let Err(e) = init_logging_from_env() {
        eprintln!("rectcheck: logging disabled: {}", e);
    }
}

/// Initialize logging from `RUST_LOG` and the `RECTCHECK_LOG_*` variables.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    if is_initialized() {
        return Ok(());
    }
    init_with_config(&LoggingConfig::from_env()?)
}

/// Install a global subscriber for `config`.
///
/// Returns `Ok(())` without doing anything if this module already installed
/// one.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    if is_initialized() {
        return Ok(());
    }

    let filter = build_env_filter(config.level)?;
    let file_layer = match &config.log_file {
        Some(path) => Some(json_file_layer(path, config.with_span_events)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(config))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

    let _ = TRACING_INITIALIZED.set(());
    Ok(())
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_file(config.with_file_info)
        .with_line_number(config.with_file_info)
        .with_span_events(span_events(config.with_span_events));

    match config.format {
        LogFormat::Human => layer.with_target(true).boxed(),
        LogFormat::Json => layer.json().with_target(false).boxed(),
    }
}

/// JSON layer appending to `path`, creating parent directories as needed
fn json_file_layer<S>(path: &Path, with_span_events: bool) -> Result<Box<dyn Layer<S> + Send + Sync>, LoggingError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let open_failed = |e: std::io::Error| LoggingError::FileOpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(open_failed)?;
        }
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_failed)?;

    Ok(fmt::layer()
        .json()
        .with_writer(file)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events(with_span_events))
        .boxed())
}

/// `RUST_LOG` wins over the configured level
fn build_env_filter(level: LogLevel) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(rust_log) => EnvFilter::try_new(rust_log).map_err(|e| LoggingError::InvalidFilter(e.to_string())),
        Err(_) => Ok(EnvFilter::new(level.as_filter_str())),
    }
}

pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}
