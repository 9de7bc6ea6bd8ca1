//! Retry policy: configuration and exponential backoff with jitter.
//!
//! The policy is a pure function of the attempt count and a [`RetryConfig`].
//! Callers may override individual parameters per call via
//! [`RetryOverrides`], which merge over the coordinator's defaults.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Upper bound (exclusive) of the random jitter added to every delay.
pub const MAX_JITTER: Duration = Duration::from_millis(1000);

/// Errors raised when a retry configuration is inconsistent.
#[derive(Debug, Error, PartialEq)]
pub enum RetryConfigError {
    /// `max_delay` is smaller than `base_delay`.
    #[error("max delay ({max_ms}ms) must not be smaller than base delay ({base_ms}ms)")]
    MaxBelowBase { base_ms: u128, max_ms: u128 },

    /// `exponential_base` is not greater than one.
    #[error("exponential base must be greater than 1, got {0}")]
    InvalidExponentialBase(f64),
}

/// Parameters of the retry policy.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    /// Default: 3
    pub max_retries: u32,

    /// Delay before the first retry, before jitter.
    /// Default: 1 second
    pub base_delay: Duration,

    /// Cap on the unjittered delay.
    /// Default: 10 seconds
    pub max_delay: Duration,

    /// Growth factor applied per retry.
    /// Default: 2.0
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the exponential base.
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Checks the invariants `max_delay >= base_delay` and `exponential_base > 1`.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_delay < self.base_delay {
            return Err(RetryConfigError::MaxBelowBase {
                base_ms: self.base_delay.as_millis(),
                max_ms: self.max_delay.as_millis(),
            });
        }
        if self.exponential_base.is_nan() || self.exponential_base <= 1.0 {
            return Err(RetryConfigError::InvalidExponentialBase(
                self.exponential_base,
            ));
        }
        Ok(())
    }

    /// Returns a copy that passes [`validate`](Self::validate).
    ///
    /// A cap below the base delay is raised to the base delay, and an
    /// exponential base that is not above one falls back to the default.
    pub fn sanitized(&self) -> Self {
        let exponential_base = if self.exponential_base.is_nan() || self.exponential_base <= 1.0 {
            Self::default().exponential_base
        } else {
            self.exponential_base
        };
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay.max(self.base_delay),
            exponential_base,
        }
    }

    /// Returns a copy with every `Some` field of `overrides` applied.
    pub fn merged(&self, overrides: &RetryOverrides) -> Self {
        Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            exponential_base: overrides.exponential_base.unwrap_or(self.exponential_base),
        }
    }

    /// Unjittered delays for every retry this configuration allows.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_retries)
            .map(|attempt| backoff_delay(attempt, self))
            .collect()
    }
}

/// Per-call overrides of the default [`RetryConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetryOverrides {
    /// Replaces [`RetryConfig::max_retries`] when set.
    pub max_retries: Option<u32>,
    /// Replaces [`RetryConfig::base_delay`] when set.
    pub base_delay: Option<Duration>,
    /// Replaces [`RetryConfig::max_delay`] when set.
    pub max_delay: Option<Duration>,
    /// Replaces [`RetryConfig::exponential_base`] when set.
    pub exponential_base: Option<f64>,
}

impl RetryOverrides {
    /// Creates overrides that change nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Override the cap on the unjittered delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Override the growth factor.
    pub fn exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = Some(base);
        self
    }

    /// Returns true if no field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Calculates the unjittered delay for a zero-based retry attempt.
///
/// The delay is `base_delay * exponential_base^attempt`, capped at `max_delay`.
pub fn backoff_delay(attempt: u32, cfg: &RetryConfig) -> Duration {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let base_millis = cfg.base_delay.as_millis() as f64;
    let max_millis = cfg.max_delay.as_millis() as f64;
    let raw = base_millis * cfg.exponential_base.powi(exponent);

    // Overflow to infinity is capped like any other large value.
    let capped = if raw.is_nan() { max_millis } else { raw.min(max_millis) };
    Duration::from_millis(capped.max(0.0) as u64)
}

/// Calculates the delay to wait before retry number `attempt` (zero-based).
///
/// Adds uniform jitter in `[0, 1000ms)` on top of [`backoff_delay`], so the
/// result is never below the unjittered value.
pub fn compute_delay(attempt: u32, cfg: &RetryConfig) -> Duration {
    let jitter_ms = rand::rng().random_range(0..MAX_JITTER.as_millis() as u64);
    backoff_delay(attempt, cfg) + Duration::from_millis(jitter_ms)
}
