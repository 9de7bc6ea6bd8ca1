//! Operation coordinator: the attempt, wait and retry loop.
//!
//! The coordinator runs a caller-supplied operation, classifies any failure,
//! and re-invokes the operation after a backoff delay while the failure is
//! retryable and retries remain. Retries of one operation id are strictly
//! sequential; distinct ids run independently with separate counters.
//!
//! # Example
//!
//! ```no_run
//! use resilient_ops::coordinator::{ExecuteOptions, OperationCoordinator};
//! use resilient_ops::error::RawError;
//!
//! # async fn demo() -> Result<(), resilient_ops::error::EnhancedError> {
//! let coordinator = OperationCoordinator::new();
//! let shows = coordinator
//!     .execute_with_retry(
//!         || async { Ok::<_, RawError>(vec!["Hamlet".to_string()]) },
//!         "GET /api/shows",
//!         &ExecuteOptions::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod store;

pub use store::AttemptStore;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{EnhancedError, ErrorClassifier, RawError};
use crate::retry::{compute_delay, RetryConfig, RetryOverrides};

/// Details handed to the `on_retry` callback before each backoff wait.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryEvent {
    /// The operation being retried.
    pub operation_id: String,
    /// The retry about to happen (1-based).
    pub attempt: u32,
    /// Maximum retries allowed for this call.
    pub max_retries: u32,
    /// Backoff delay before the retry.
    pub delay: Duration,
    /// The failure that triggered the retry.
    pub error: EnhancedError,
}

/// Callback invoked before each retry.
pub type RetryCallback = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Per-call options for [`OperationCoordinator::execute_with_retry`].
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Invoked before each backoff wait.
    pub on_retry: Option<RetryCallback>,
    /// Overrides merged over the coordinator's default policy.
    pub retry_config: RetryOverrides,
    /// Keeps terminal failures away from the notification sink.
    pub suppress_toast: bool,
    /// Context used when classifying failures; defaults to the operation id.
    pub context: Option<String>,
    /// Cooperative cancellation for the whole retry sequence.
    pub cancel: Option<CancellationToken>,
    /// Time limit for a single attempt. Exceeding it is a retryable failure.
    pub attempt_timeout: Option<Duration>,
}

impl ExecuteOptions {
    /// Creates options with no callback, no overrides and no context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked before each backoff wait.
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Set the overrides merged over the coordinator's default policy.
    pub fn with_retry_config(mut self, overrides: RetryOverrides) -> Self {
        self.retry_config = overrides;
        self
    }

    /// Set whether terminal failures skip the notification sink.
    pub fn suppress_toast(mut self, suppress: bool) -> Self {
        self.suppress_toast = suppress;
        self
    }

    /// Set the context attached to classified failures.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the token that cancels the whole retry sequence.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the time limit for each attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("on_retry", &self.on_retry.is_some())
            .field("retry_config", &self.retry_config)
            .field("suppress_toast", &self.suppress_toast)
            .field("context", &self.context)
            .field("cancel", &self.cancel.is_some())
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

/// Drives retry sequences and owns their attempt counters.
#[derive(Debug, Clone, Default)]
pub struct OperationCoordinator {
    store: AttemptStore,
    defaults: RetryConfig,
    classifier: ErrorClassifier,
}

static GLOBAL: OnceLock<Arc<OperationCoordinator>> = OnceLock::new();

impl OperationCoordinator {
    /// Creates a coordinator with default policy and a fresh store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coordinator with a custom default policy.
    pub fn with_config(defaults: RetryConfig) -> Self {
        Self::with_store(AttemptStore::new(), defaults)
    }

    /// Creates a coordinator around an existing store.
    pub fn with_store(store: AttemptStore, defaults: RetryConfig) -> Self {
        Self {
            store,
            defaults,
            classifier: ErrorClassifier::new(),
        }
    }

    /// The process-wide coordinator, created on first use with defaults.
    pub fn global() -> Arc<OperationCoordinator> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(OperationCoordinator::new())))
    }

    /// The default retry policy.
    pub fn defaults(&self) -> &RetryConfig {
        &self.defaults
    }

    /// The classifier used for failures.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Runs `operation`, retrying retryable failures with backoff.
    ///
    /// Resolves with the operation's value, or with the classified error once
    /// the failure is terminal, retries are exhausted, or the sequence is
    /// cancelled. The attempt counter for `operation_id` is cleared in every
    /// one of those outcomes.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
        operation_id: &str,
        options: &ExecuteOptions,
    ) -> Result<T, EnhancedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawError>,
    {
        let config = self.effective_config(&options.retry_config, operation_id);
        let context = options.context.as_deref().unwrap_or(operation_id);
        let mut retries = self.store.get(operation_id);

        loop {
            if is_cancelled(options.cancel.as_ref()) {
                return Err(self.fail(operation_id, self.classifier.cancelled(context)));
            }

            let failure = match self.attempt(operation(), options, context).await {
                Ok(value) => {
                    self.store.remove(operation_id);
                    if retries > 0 {
                        info!(operation_id, retries, "operation recovered after retries");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            if !failure.retryable || retries >= config.max_retries {
                return Err(self.fail(operation_id, failure));
            }

            let delay = compute_delay(retries, &config);
            retries += 1;
            self.store.increment(operation_id);

            warn!(
                operation_id,
                attempt = retries,
                max_retries = config.max_retries,
                delay_ms = delay.as_millis() as u64,
                code = %failure.code,
                "retrying operation"
            );

            if let Some(callback) = &options.on_retry {
                callback(&RetryEvent {
                    operation_id: operation_id.to_string(),
                    attempt: retries,
                    max_retries: config.max_retries,
                    delay,
                    error: failure,
                });
            }

            if !wait(delay, options.cancel.as_ref()).await {
                return Err(self.fail(operation_id, self.classifier.cancelled(context)));
            }
        }
    }

    /// Retries consumed so far by the in-flight sequence for `operation_id`.
    pub fn get_retry_count(&self, operation_id: &str) -> u32 {
        self.store.get(operation_id)
    }

    /// Forgets the retry count for `operation_id`.
    pub fn reset_retry_count(&self, operation_id: &str) {
        self.store.remove(operation_id);
    }

    /// Forgets every retry count, e.g. on logout.
    pub fn clear_all_retry_counts(&self) {
        self.store.clear();
    }

    /// Merges `overrides` over the defaults, repairing an invalid result.
    fn effective_config(&self, overrides: &RetryOverrides, operation_id: &str) -> RetryConfig {
        let config = self.defaults.merged(overrides);
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(operation_id, error = %e, "invalid retry policy, using a repaired one");
                config.sanitized()
            }
        }
    }

    async fn attempt<T, E, Fut>(
        &self,
        future: Fut,
        options: &ExecuteOptions,
        context: &str,
    ) -> Result<T, EnhancedError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawError>,
    {
        let timed = async {
            match options.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, future).await {
                    Ok(result) => result.map_err(|e| self.classifier.classify(e.into(), context)),
                    Err(_) => Err(self.classifier.timeout(limit, context)),
                },
                None => future
                    .await
                    .map_err(|e| self.classifier.classify(e.into(), context)),
            }
        };

        match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(self.classifier.cancelled(context)),
                result = timed => result,
            },
            None => timed.await,
        }
    }

    fn fail(&self, operation_id: &str, failure: EnhancedError) -> EnhancedError {
        self.store.remove(operation_id);
        error!(
            operation_id,
            code = %failure.code,
            retryable = failure.retryable,
            message = %failure.message,
            "operation failed"
        );
        failure
    }
}

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// Sleeps for `delay`; returns false if cancelled first.
async fn wait(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = token.cancelled() => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}
