//! File and environment settings.
//!
//! Settings come from an optional TOML file, then `RESOPS__*` environment
//! variables (double underscore between section and key, e.g.
//! `RESOPS__RETRY__MAX_RETRIES=5`). Missing sections and keys keep their
//! defaults.
//!
//! ```toml
//! [retry]
//! max_retries = 5
//! base_delay_ms = 500
//! max_delay_ms = 8000
//! exponential_base = 2.0
//!
//! [network]
//! probe_url = "https://status.example.com/health"
//! probe_interval_secs = 30
//! probe_timeout_secs = 5
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;
use std::time::Duration;

use ::config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogLevel;
use crate::network::ProbeConfig;
use crate::retry::{RetryConfig, RetryConfigError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RESOPS";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An explicit settings path does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(String),

    /// The file or an environment override could not be read.
    #[error("failed to parse config: {0}")]
    Parse(#[from] ConfigError),

    /// The `[retry]` section describes an unusable policy.
    #[error("invalid retry settings: {0}")]
    InvalidRetry(#[from] RetryConfigError),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default retry policy.
    pub retry: RetrySettings,
    /// Connectivity probe.
    pub network: NetworkSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Default: 3
    pub max_retries: u32,
    /// Default: 1000
    pub base_delay_ms: u64,
    /// Default: 10000
    pub max_delay_ms: u64,
    /// Default: 2.0
    pub exponential_base: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
        }
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Health endpoint polled by the connectivity probe. Default: none
    pub probe_url: Option<String>,
    /// Default: 30
    pub probe_interval_secs: u64,
    /// Default: 5
    pub probe_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe_url: None,
            probe_interval_secs: 30,
            probe_timeout_secs: 5,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default: info
    pub level: LogLevel,
}

impl Settings {
    /// Loads `path` (if given) and environment overrides.
    ///
    /// A path that does not exist is an error; no path means environment
    /// and defaults only.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(SettingsError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.retry_config()?;
        Ok(settings)
    }

    /// Parses settings from TOML text, without environment overrides.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.retry_config()?;
        Ok(settings)
    }

    /// The validated default retry policy.
    pub fn retry_config(&self) -> Result<RetryConfig, RetryConfigError> {
        let config = RetryConfig::new()
            .with_max_retries(self.retry.max_retries)
            .with_base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .with_exponential_base(self.retry.exponential_base);
        config.validate()?;
        Ok(config)
    }

    /// Probe settings, if a probe URL is configured.
    pub fn probe_config(&self) -> Option<ProbeConfig> {
        let url = self.network.probe_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(
            ProbeConfig::new(url)
                .with_interval(Duration::from_secs(self.network.probe_interval_secs))
                .with_request_timeout(Duration::from_secs(self.network.probe_timeout_secs)),
        )
    }
}
