//! Binding layer between UI-facing code and the coordinator.
//!
//! [`ErrorHandler`] bundles the coordinator, a notification sink and the
//! network monitor behind the small API the rest of the application uses.
//! [`ManagedOperation`] layers loading/error/data state on top of it.

mod managed;

pub use managed::{ManagedOperation, OperationState};

use std::future::Future;
use std::sync::Arc;

use crate::coordinator::{ExecuteOptions, OperationCoordinator};
use crate::error::{EnhancedError, ErrorCode, RawError};
use crate::network::NetworkStatusMonitor;
use crate::notification::{NotificationSink, TracingSink};

/// Error display, retrying execution and connectivity, in one handle.
#[derive(Clone)]
pub struct ErrorHandler {
    coordinator: Arc<OperationCoordinator>,
    sink: Arc<dyn NotificationSink>,
    network: NetworkStatusMonitor,
}

impl ErrorHandler {
    /// Creates a handler from its three collaborators.
    pub fn new(
        coordinator: Arc<OperationCoordinator>,
        sink: Arc<dyn NotificationSink>,
        network: NetworkStatusMonitor,
    ) -> Self {
        Self {
            coordinator,
            sink,
            network,
        }
    }

    /// Uses the process-wide coordinator and an online monitor.
    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(
            OperationCoordinator::global(),
            sink,
            NetworkStatusMonitor::default(),
        )
    }

    /// The coordinator that runs retry sequences.
    pub fn coordinator(&self) -> &Arc<OperationCoordinator> {
        &self.coordinator
    }

    /// The connectivity monitor behind [`is_online`](Self::is_online).
    pub fn network(&self) -> &NetworkStatusMonitor {
        &self.network
    }

    /// Classifies `raw` and shows it unless `options.suppress_toast` is set.
    ///
    /// `context` takes precedence over `options.context`. Errors that were
    /// already classified keep their code and gain the context unless they
    /// already carry it.
    pub fn handle_error(
        &self,
        raw: impl Into<RawError>,
        context: Option<&str>,
        options: &ExecuteOptions,
    ) -> EnhancedError {
        let context = context.or(options.context.as_deref()).unwrap_or("");
        let raw = raw.into();
        let already_classified = matches!(raw, RawError::Classified(_));
        let mut error = self.coordinator.classifier().classify(raw, context);
        if already_classified && !has_context(&error, context) {
            error = error.annotate_context(context);
        }
        self.notify(&error, options);
        error
    }

    /// Like [`handle_error`](Self::handle_error) for a failed response,
    /// reading its body first.
    pub async fn handle_response(
        &self,
        response: reqwest::Response,
        context: Option<&str>,
        options: &ExecuteOptions,
    ) -> EnhancedError {
        let raw = RawError::from_response(response).await;
        self.handle_error(raw, context, options)
    }

    /// Runs `operation` through the coordinator, showing terminal failures
    /// unless suppressed.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        operation_id: &str,
        options: &ExecuteOptions,
    ) -> Result<T, EnhancedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<RawError>,
    {
        let result = self
            .coordinator
            .execute_with_retry(operation, operation_id, options)
            .await;
        if let Err(error) = &result {
            self.notify(error, options);
        }
        result
    }

    /// Retries consumed so far by the in-flight sequence for `operation_id`.
    pub fn get_retry_count(&self, operation_id: &str) -> u32 {
        self.coordinator.get_retry_count(operation_id)
    }

    /// Forgets the retry count for `operation_id`.
    pub fn reset_retry_count(&self, operation_id: &str) {
        self.coordinator.reset_retry_count(operation_id);
    }

    /// Current connectivity, as last reported to the monitor.
    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    // Cancellation is the caller's own doing and is never shown.
    fn notify(&self, error: &EnhancedError, options: &ExecuteOptions) {
        if options.suppress_toast || error.code == ErrorCode::Cancelled {
            return;
        }
        self.sink.show_error(error);
    }
}

fn has_context(error: &EnhancedError, context: &str) -> bool {
    let marker = format!("Context: {context}");
    error
        .details
        .as_deref()
        .is_some_and(|details| details.contains(&marker))
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("coordinator", &self.coordinator)
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClassifier;
    use crate::network::ConnectivityEvent;
    use crate::notification::ChannelSink;
    use crate::retry::RetryOverrides;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_util::sync::CancellationToken;

    fn handler() -> (ErrorHandler, UnboundedReceiver<EnhancedError>) {
        let (sink, receiver) = ChannelSink::new();
        let handler = ErrorHandler::new(
            Arc::new(OperationCoordinator::new()),
            Arc::new(sink),
            NetworkStatusMonitor::new(true),
        );
        (handler, receiver)
    }

    #[test]
    fn test_handle_error_notifies() {
        let (handler, mut toasts) = handler();
        let error = handler.handle_error(
            RawError::status(403),
            Some("Editing venue"),
            &ExecuteOptions::default(),
        );

        assert_eq!(error.code, ErrorCode::Forbidden);
        assert_eq!(error.details.as_deref(), Some("Context: Editing venue"));
        assert_eq!(toasts.try_recv().unwrap(), error);
    }

    #[test]
    fn test_handle_error_annotates_classified_errors() {
        let (handler, mut toasts) = handler();
        let earlier = ErrorClassifier::new().classify(RawError::status(404), "");

        let error = handler.handle_error(
            earlier.clone(),
            Some("Editing venue"),
            &ExecuteOptions::default(),
        );

        assert_eq!(error.code, ErrorCode::NotFound);
        assert_eq!(error.message, earlier.message);
        assert_eq!(error.details.as_deref(), Some("Context: Editing venue"));
        assert_eq!(toasts.try_recv().unwrap(), error);
    }

    #[test]
    fn test_handle_error_does_not_repeat_context() {
        let (handler, _toasts) = handler();
        let earlier = ErrorClassifier::new().classify(RawError::status(503), "GET /api/shows");

        let error = handler.handle_error(
            earlier,
            Some("GET /api/shows"),
            &ExecuteOptions::new().suppress_toast(true),
        );

        assert_eq!(error.details.as_deref(), Some("Context: GET /api/shows"));
    }

    #[test]
    fn test_handle_error_suppressed() {
        let (handler, mut toasts) = handler();
        let error = handler.handle_error(
            "boom",
            None,
            &ExecuteOptions::new().suppress_toast(true),
        );

        assert_eq!(error.message, "boom");
        assert!(toasts.try_recv().is_err());
    }

    #[test]
    fn test_handle_error_falls_back_to_option_context() {
        let (handler, _toasts) = handler();
        let error = handler.handle_error(
            "boom",
            None,
            &ExecuteOptions::new().with_context("Saving script"),
        );
        assert_eq!(error.details.as_deref(), Some("Context: Saving script"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_success_does_not_notify() {
        let (handler, mut toasts) = handler();
        let value = handler
            .execute_with_retry(
                || async { Ok::<_, RawError>("ok") },
                "GET /api/shows",
                &ExecuteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_terminal_failure_notifies_once() {
        let (handler, mut toasts) = handler();
        let options =
            ExecuteOptions::new().with_retry_config(RetryOverrides::new().max_retries(2));

        let err = handler
            .execute_with_retry(
                || async { Err::<(), _>(RawError::status(504)) },
                "GET /api/crew",
                &options,
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::GatewayTimeout);
        assert_eq!(toasts.try_recv().unwrap(), err);
        assert!(toasts.try_recv().is_err());
        assert_eq!(handler.get_retry_count("GET /api/crew"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_suppressed_failure() {
        let (handler, mut toasts) = handler();
        let _ = handler
            .execute_with_retry(
                || async { Err::<(), _>(RawError::status(400)) },
                "POST /api/shows",
                &ExecuteOptions::new().suppress_toast(true),
            )
            .await;
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_not_shown() {
        let (handler, mut toasts) = handler();
        let token = CancellationToken::new();
        token.cancel();

        let err = handler
            .execute_with_retry(
                || async { Ok::<_, RawError>(()) },
                "GET /api/shows",
                &ExecuteOptions::new().with_cancellation(token),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Cancelled);
        assert!(toasts.try_recv().is_err());
    }

    #[test]
    fn test_is_online_reflects_monitor() {
        let (handler, _toasts) = handler();
        assert!(handler.is_online());
        handler.network().handle_event(ConnectivityEvent::Offline);
        assert!(!handler.is_online());
    }
}
