//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` wins over the configured level when it is set.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Minimum level that is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Disables logging.
    Off,
}

impl LogLevel {
    /// Lowercase name, as accepted by `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Raises the level by `verbosity` steps, never past trace.
    ///
    /// Used when `-v` is given on top of a configured level.
    pub fn raised(self, verbosity: u8) -> Self {
        if verbosity == 0 {
            return self;
        }
        let from_flags = LogLevel::from(verbosity);
        match (self, from_flags) {
            (LogLevel::Trace, _) | (_, LogLevel::Trace) => LogLevel::Trace,
            _ => LogLevel::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl From<u8> for LogLevel {
    /// 0 = info, 1 = debug, 2+ = trace.
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default: info
    pub level: LogLevel,
    /// Default: false
    pub with_timestamps: bool,
    /// Default: true
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamps: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Same as [`LoggingConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum level when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Prefix each line with a timestamp.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Include the emitting module path.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Level for a `-v` count: 0 is info, 1 debug, 2+ trace.
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self::default().with_level(LogLevel::from(verbosity))
    }

    fn filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.level.as_str())
        }
    }
}

/// Installs the global subscriber.
///
/// Returns false if a subscriber was already installed, which leaves the
/// existing one in place.
///
/// ```no_run
/// use resilient_ops::logging::{init_logging, LogLevel, LoggingConfig};
///
/// init_logging(LoggingConfig::new().with_level(LogLevel::Debug));
/// ```
pub fn init_logging(config: LoggingConfig) -> bool {
    let builder = tracing_fmt::Subscriber::builder()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    if config.with_timestamps {
        builder.try_init().is_ok()
    } else {
        builder.without_time().try_init().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(LogLevel::from(0), LogLevel::Info);
        assert_eq!(LogLevel::from(1), LogLevel::Debug);
        assert_eq!(LogLevel::from(2), LogLevel::Trace);
        assert_eq!(LogLevel::from(9), LogLevel::Trace);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" off ".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_raised() {
        assert_eq!(LogLevel::Warn.raised(0), LogLevel::Warn);
        assert_eq!(LogLevel::Warn.raised(1), LogLevel::Debug);
        assert_eq!(LogLevel::Info.raised(3), LogLevel::Trace);
        assert_eq!(LogLevel::Trace.raised(1), LogLevel::Trace);
    }

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Debug)
            .with_timestamps(true)
            .with_target(false);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.with_timestamps);
        assert!(!config.with_target);
        assert_eq!(LoggingConfig::from_verbosity(2).level, LogLevel::Trace);
    }

    #[test]
    fn test_second_init_is_refused() {
        init_logging(LoggingConfig::new().with_level(LogLevel::Off));
        assert!(!init_logging(LoggingConfig::new()));
    }
}
