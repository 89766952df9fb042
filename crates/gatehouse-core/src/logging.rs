//! The gateway's structured logger.
//!
//! Components receive a [`Logger`] rather than calling `tracing` macros
//! directly whenever the log destination is part of their contract (for
//! instance, diagnostic output that must land on a specific writer).
//! [`TracingLogger`] is the standard implementation: it either forwards to the
//! process-wide `tracing` subscriber, or owns a private `tracing_subscriber`
//! dispatcher bound to its own level and writer.
//!
//! # Example
//!
//! ```
//! use gatehouse_core::{LogLevel, Logger, TracingLogger};
//!
//! let logger = TracingLogger::stdout(LogLevel::Debug, "[SERVICE: api]");
//! logger.debug("CORS debug enabled");
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::LoggingError;

/// Severity levels understood by the gateway logger, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Something unexpected that does not stop the service.
    Warning,
    /// A failed operation.
    Error,
    /// A failure that compromises the service.
    Critical,
}

impl LogLevel {
    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Maps the level onto the closest `tracing` filter.
    #[must_use]
    pub fn as_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error | Self::Critical => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

/// The gateway's structured logger interface.
pub trait Logger: Send + Sync + 'static {
    /// Logs at debug level.
    fn debug(&self, message: &str);

    /// Logs at info level.
    fn info(&self, message: &str);

    /// Logs at warning level.
    fn warning(&self, message: &str);

    /// Logs at error level.
    fn error(&self, message: &str);

    /// Logs at critical level.
    fn critical(&self, message: &str);
}

/// A logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn critical(&self, _message: &str) {}
}

/// A [`Logger`] backed by `tracing`.
#[derive(Clone)]
pub struct TracingLogger {
    level: LogLevel,
    prefix: String,
    /// Private dispatcher; `None` logs through the global subscriber.
    dispatch: Option<Dispatch>,
}

impl fmt::Debug for TracingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingLogger")
            .field("level", &self.level)
            .field("prefix", &self.prefix)
            .field("private_dispatch", &self.dispatch.is_some())
            .finish()
    }
}

impl TracingLogger {
    /// Creates a logger bound to its own writer.
    ///
    /// The logger owns a private `tracing_subscriber::fmt` dispatcher, so
    /// creating one never touches the process-wide subscriber.
    pub fn new<W>(level: LogLevel, writer: W, prefix: impl Into<String>) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_max_level(level.as_filter())
            .with_ansi(false)
            .with_target(false)
            .finish();

        Self {
            level,
            prefix: prefix.into(),
            dispatch: Some(Dispatch::new(subscriber)),
        }
    }

    /// Creates a logger writing to standard output.
    pub fn stdout(level: LogLevel, prefix: impl Into<String>) -> Self {
        Self::new(level, std::io::stdout, prefix)
    }

    /// Creates a logger from a level name such as `"DEBUG"`.
    pub fn from_level_name<W>(
        level: &str,
        writer: W,
        prefix: impl Into<String>,
    ) -> Result<Self, LoggingError>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        Ok(Self::new(level.parse()?, writer, prefix))
    }

    /// Creates a logger that forwards to the global `tracing` subscriber.
    pub fn global(level: LogLevel, prefix: impl Into<String>) -> Self {
        Self {
            level,
            prefix: prefix.into(),
            dispatch: None,
        }
    }

    /// Returns the minimum level this logger emits.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, level: LogLevel, message: &str) {
        if level < self.level {
            return;
        }
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || self.emit(level, message));
            }
            None => self.emit(level, message),
        }
    }

    fn emit(&self, level: LogLevel, message: &str) {
        let prefix = self.prefix.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(prefix, "{}", message),
            LogLevel::Info => tracing::info!(prefix, "{}", message),
            LogLevel::Warning => tracing::warn!(prefix, "{}", message),
            LogLevel::Error => tracing::error!(prefix, "{}", message),
            LogLevel::Critical => tracing::error!(prefix, critical = true, "{}", message),
        }
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
}

/// Process-wide logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "gatehouse_cors=debug").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            include_target: true,
        }
    }
}

/// Installs the process-wide `tracing` subscriber.
///
/// # Errors
///
/// Returns [`LoggingError::Init`] if the filter is invalid or a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LoggingError::Init(format!("invalid log filter: {e}")))?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
    }

    Ok(())
}
