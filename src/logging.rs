//! Logging setup for chirp.
//!
//! Structured logging through the `tracing` ecosystem. All output goes to
//! stderr so that `--format json` on stdout stays machine-readable.
//!
//! # Usage
//!
//! ```rust
//! use chirp::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::default();
//! init_logging(&config);
//!
//! tracing::info!("Application started");
//! ```

use crate::config::LoggingConfig;
use crate::error::{ChirpError, format_unknown_value_error};
use tracing::warn;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: LogLevel,
    /// Output format for log messages.
    pub format: LogFormat,
    /// Include timestamps in log output.
    pub timestamps: bool,
    /// Include target (module path) in log output.
    pub target: bool,
    /// Include span events (enter/exit).
    pub spans: bool,
    /// Enable ANSI colors in output.
    pub colors: bool,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    /// No logging at all.
    Off,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    Pretty,
    /// Compact single-line format.
    Compact,
    /// Full format with thread and source location.
    Full,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            timestamps: false,
            target: false,
            spans: false,
            colors: true,
        }
    }
}

impl LogConfig {
    /// Errors only.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            timestamps: false,
            target: false,
            spans: false,
            colors: true,
        }
    }

    /// Debug level with module targets.
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            timestamps: true,
            target: true,
            spans: false,
            colors: true,
        }
    }

    /// Create a config for trace mode (maximum verbosity).
    #[must_use]
    pub const fn trace() -> Self {
        Self {
            level: LogLevel::Trace,
            format: LogFormat::Full,
            timestamps: true,
            target: true,
            spans: true,
            colors: true,
        }
    }
}

impl LogConfig {
    /// The default preset with level and format taken from the `[logging]`
    /// settings. Values that do not parse keep the preset's.
    #[must_use]
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let mut config = Self::default();
        if let Ok(level) = settings.level.parse() {
            config.level = level;
        }
        if let Ok(format) = settings.format.parse() {
            config.format = format;
        }
        config
    }
}

impl LogLevel {
    /// Convert to env filter directive string.
    const fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Off => "off",
        }
    }
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace", "off"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "full"];

/// Parses the `logging.level` setting.
impl std::str::FromStr for LogLevel {
    type Err = ChirpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "off" | "none" => Ok(Self::Off),
            _ => Err(ChirpError::InvalidArgument {
                reason: format_unknown_value_error("log level", s, LOG_LEVELS),
            }),
        }
    }
}

/// Parses the `logging.format` setting.
impl std::str::FromStr for LogFormat {
    type Err = ChirpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            _ => Err(ChirpError::InvalidArgument {
                reason: format_unknown_value_error("log format", s, LOG_FORMATS),
            }),
        }
    }
}

/// Initialize the logging system with the given configuration.
///
/// `RUST_LOG` overrides the configured level when set. Only the first call
/// installs a subscriber; later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("chirp={}", config.level.to_filter_string()))
    };

    let span_events = if config.spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.colors)
        .with_target(config.target)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(env_filter);
    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry.with(base.pretty()).try_init().ok(),
        (LogFormat::Pretty, false) => registry.with(base.pretty().without_time()).try_init().ok(),
        (LogFormat::Compact, true) => registry.with(base.compact()).try_init().ok(),
        (LogFormat::Compact, false) => registry
            .with(base.compact().without_time())
            .try_init()
            .ok(),
        (LogFormat::Full, _) => registry
            .with(
                base.with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .ok(),
    };
}

/// Pick the CLI logging config. `--quiet` and `--verbose` win over the
/// `[logging]` settings.
#[must_use]
pub fn cli_log_config(quiet: bool, verbose: u8, settings: &LoggingConfig) -> LogConfig {
    if quiet {
        return LogConfig::quiet();
    }
    match verbose {
        0 => LogConfig::from_settings(settings),
        1 => LogConfig::verbose(),
        _ => LogConfig::trace(),
    }
}

/// Initialize logging for CLI use.
pub fn init_cli_logging(quiet: bool, verbose: u8, colors: bool, settings: &LoggingConfig) {
    let mut config = cli_log_config(quiet, verbose, settings);
    config.colors = colors;
    init_logging(&config);

    if settings.level.parse::<LogLevel>().is_err() {
        warn!(level = %settings.level, "Ignoring invalid logging.level");
    }
    if settings.format.parse::<LogFormat>().is_err() {
        warn!(format = %settings.format, "Ignoring invalid logging.format");
    }
}
