//! # Logging Utilities
//!
//! `tracing` setup for the dbgstub binaries.
//!
//! Log output always goes to **stderr** (and optionally a file), never
//! stdout: in `stdio` mode stdout carries the RSP byte stream, and a single
//! stray log line there would corrupt the session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbgstub_utils::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_env().expect("bad logging environment");
//! let _guard = init_logging(&config).expect("Failed to initialize logging");
//!
//! tracing::info!("stub listening");
//! ```
//!
//! Keep the returned guard alive for as long as the program logs; dropping it
//! flushes and closes the log file.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=dbgstub_protocol=trace`)
//! - `DBGSTUB_LOG_FORMAT`: `pretty` (default) or `json`
//! - `DBGSTUB_LOG_FILE`: also log to this file; if it names a directory, a
//!   dated `YYYY-MM-DD-dbgstub.log` is created inside it

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_ENV: &str = "DBGSTUB_LOG_FORMAT";

/// Environment variable naming an additional log file
pub const LOG_FILE_ENV: &str = "DBGSTUB_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level: one line per command
    Debug,
    /// Trace level: every packet on the wire
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Where and how to log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    /// Explicit level; overrides `RUST_LOG` when set
    pub level: Option<LogLevel>,
    /// Output format for every sink
    pub format: LogFormat,
    /// Additional log file (or directory for a dated file)
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Read `DBGSTUB_LOG_FORMAT` and `DBGSTUB_LOG_FILE`
    ///
    /// ## Errors
    ///
    /// `InvalidFormat` if `DBGSTUB_LOG_FORMAT` is set to an unknown format.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var(LOG_FORMAT_ENV) {
            Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat)?,
            Err(_) => LogFormat::default(),
        };
        let file = env::var_os(LOG_FILE_ENV).map(PathBuf::from);

        Ok(Self {
            level: None,
            format,
            file,
        })
    }

    /// Override the level (typically from a `--log-level` flag)
    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self
    {
        if level.is_some() {
            self.level = level;
        }
        self
    }

    /// Build the event filter
    ///
    /// Precedence: explicit level, then `RUST_LOG` (module filters allowed),
    /// then `info`.
    #[must_use]
    pub fn filter(&self) -> EnvFilter
    {
        if let Some(level) = self.level {
            return EnvFilter::new(Level::from(level).to_string());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber described by `config`
///
/// Returns the file writer's guard when a log file is configured.
///
/// ## Example
///
/// ```rust,no_run
/// use dbgstub_utils::{init_logging, LogConfig, LogFormat, LogLevel};
///
/// let config = LogConfig {
///     level: Some(LogLevel::Debug),
///     format: LogFormat::Json,
///     file: None,
/// };
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// - `FileError` if the log file's directory cannot be created
/// - `InvalidPath` if the log file path has no file name
/// - `InitializationFailed` if a global subscriber is already installed
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LoggingError>
{
    let mut layers = vec![build_layer(config.format, io::stderr, true, config.filter())];

    let guard = match &config.file {
        Some(path) => {
            let path = resolve_log_path(path);
            let name = path
                .file_name()
                .ok_or_else(|| LoggingError::InvalidPath(path.clone()))?;
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            fs::create_dir_all(dir)?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            layers.push(build_layer(config.format, writer, false, config.filter()));
            Some(guard)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InitializationFailed(e.to_string()))?;

    Ok(guard)
}

/// Initialize from the environment with an optional explicit level
///
/// ## Errors
///
/// See [`LogConfig::from_env`] and [`init_logging`].
pub fn init_logging_with_level(level: Option<LogLevel>) -> Result<Option<WorkerGuard>, LoggingError>
{
    init_logging(&LogConfig::from_env()?.with_level(level))
}

/// Turn a directory into a dated log file inside it; other paths pass through
#[must_use]
pub fn resolve_log_path(path: &Path) -> PathBuf
{
    if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        path.join(format!("{today}-dbgstub.log"))
    } else {
        path.to_path_buf()
    }
}

fn build_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Log file path without a file name
    #[error("Invalid log file path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("dev").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("error").unwrap(), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_log_level_to_tracing_level()
    {
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_with_level_only_overrides_when_set()
    {
        let config = LogConfig::default().with_level(Some(LogLevel::Trace));
        assert_eq!(config.level, Some(LogLevel::Trace));

        let config = config.with_level(None);
        assert_eq!(config.level, Some(LogLevel::Trace));
    }

    #[test]
    fn test_resolve_log_path_dates_directories()
    {
        let dir = env::temp_dir();
        let resolved = resolve_log_path(&dir);
        assert_eq!(resolved.parent(), Some(dir.as_path()));

        let name = resolved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-dbgstub.log"));
        assert_eq!(name.len(), "YYYY-MM-DD-dbgstub.log".len());
    }

    #[test]
    fn test_resolve_log_path_keeps_files()
    {
        let file = env::temp_dir().join("dbgstub-does-not-exist.log");
        assert_eq!(resolve_log_path(&file), file);
    }
}
