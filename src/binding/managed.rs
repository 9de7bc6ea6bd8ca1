//! Managed async operation: loading, error and data state around one call.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};
use tokio::sync::watch;

use super::ErrorHandler;
use crate::coordinator::ExecuteOptions;
use crate::error::{EnhancedError, RawError};

type Operation<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, RawError>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&EnhancedError) + Send + Sync>;

/// Snapshot of a managed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    /// An execution is in flight.
    pub is_loading: bool,
    /// Failure of the latest execution, cleared when a new one starts.
    pub error: Option<EnhancedError>,
    /// Value of the latest successful execution.
    pub data: Option<T>,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            error: None,
            data: None,
        }
    }
}

/// Wraps an operation with retry, notification and observable state.
///
/// Each [`execute`](Self::execute) sets `is_loading`, clears the previous
/// error, and on completion stores either the data or the classified error.
/// Previous data is kept while a new execution is loading.
pub struct ManagedOperation<T> {
    handler: ErrorHandler,
    operation_id: String,
    operation: Operation<T>,
    options: ExecuteOptions,
    state: watch::Sender<OperationState<T>>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> ManagedOperation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps `operation`, run through `handler` under `operation_id`.
    pub fn new<F, Fut, E>(handler: ErrorHandler, operation_id: impl Into<String>, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<RawError> + 'static,
    {
        let operation: Operation<T> = Arc::new(move || {
            operation()
                .map_err(|e: E| -> RawError { e.into() })
                .boxed()
        });
        let (state, _) = watch::channel(OperationState::default());
        Self {
            handler,
            operation_id: operation_id.into(),
            operation,
            options: ExecuteOptions::default(),
            state,
            on_success: None,
            on_error: None,
        }
    }

    /// Options passed to every execution.
    /// Default: [`ExecuteOptions::default`]
    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    /// Called with the value after each successful execution.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called with the error after each failed execution.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EnhancedError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Key used for retry tracking.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Current state.
    pub fn state(&self) -> OperationState<T> {
        self.state.borrow().clone()
    }

    /// Observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.state.subscribe()
    }

    /// Shorthand for `state().is_loading`.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Failure of the latest execution, if any.
    pub fn error(&self) -> Option<EnhancedError> {
        self.state.borrow().error.clone()
    }

    /// Value of the latest successful execution, if any.
    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    /// Runs the operation with retries and records the outcome.
    pub async fn execute(&self) -> Result<T, EnhancedError> {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let operation = Arc::clone(&self.operation);
        let result = self
            .handler
            .execute_with_retry(move || operation(), &self.operation_id, &self.options)
            .await;

        match &result {
            Ok(data) => {
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.data = Some(data.clone());
                });
                if let Some(callback) = &self.on_success {
                    callback(data);
                }
            }
            Err(error) => {
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(error.clone());
                });
                if let Some(callback) = &self.on_error {
                    callback(error);
                }
            }
        }

        result
    }

    /// Clears data and error.
    pub fn reset(&self) {
        self.state.send_replace(OperationState::default());
    }
}

impl<T> std::fmt::Debug for ManagedOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedOperation")
            .field("operation_id", &self.operation_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
