//! Error classifier for raw operation failures.
//!
//! Converts HTTP responses, transport failures, arbitrary errors and plain
//! messages into [`EnhancedError`] records, in a fixed priority order, and
//! logs every classification for diagnostics.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::{EnhancedError, ErrorCode, RawError, Severity};

/// Message used for connectivity failures.
pub const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Please check your internet connection.";

/// Message used when nothing better is known.
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

/// Stateless classifier that turns [`RawError`]s into [`EnhancedError`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Creates a new classifier.
    pub fn new() -> Self {
        Self
    }

    /// Classifies a raw failure, annotating the details with `context`.
    ///
    /// Rules, in priority order:
    /// 1. HTTP responses: status-derived code, message from the JSON body.
    /// 2. Connection failures: retryable `NETWORK`.
    /// 3. Other errors: `UNKNOWN_ERROR` with the error's own message.
    /// 4. Plain messages: `UNKNOWN_ERROR` with the message as-is.
    /// 5. Anything else: generic `UNKNOWN_ERROR`.
    ///
    /// Errors that were already classified pass through unchanged.
    pub fn classify(&self, raw: RawError, context: &str) -> EnhancedError {
        let raw_description = raw.describe();
        let classified = match raw {
            RawError::Classified(err) => err,
            RawError::Http { status, body } => {
                classify_http(status, body.as_deref()).annotate_context(context)
            }
            RawError::Network(cause) => {
                EnhancedError::new(ErrorCode::Network, NETWORK_MESSAGE, Severity::Warning)
                    .with_details(cause)
                    .annotate_context(context)
            }
            RawError::Exception(err) => {
                let message = err.to_string();
                let message = if message.trim().is_empty() {
                    UNEXPECTED_MESSAGE.to_string()
                } else {
                    message
                };
                EnhancedError::new(ErrorCode::UnknownError, message, Severity::Error)
                    .annotate_context(context)
            }
            RawError::Message(message) => {
                EnhancedError::new(ErrorCode::UnknownError, message, Severity::Error)
                    .annotate_context(context)
            }
            RawError::Other(_) => {
                EnhancedError::new(ErrorCode::UnknownError, UNEXPECTED_MESSAGE, Severity::Error)
                    .annotate_context(context)
            }
        };

        log_classification(context, &raw_description, &classified);
        classified
    }

    /// Builds the retryable error for an attempt that exceeded its time limit.
    pub fn timeout(&self, after: Duration, context: &str) -> EnhancedError {
        let error = EnhancedError::new(
            ErrorCode::Timeout,
            "The request took too long to respond.",
            Severity::Warning,
        )
        .with_details(format!("Attempt timed out after {}ms", after.as_millis()))
        .annotate_context(context);

        log_classification(
            context,
            &format!("attempt timeout after {}ms", after.as_millis()),
            &error,
        );
        error
    }

    /// Builds the terminal error for a cancelled retry sequence.
    pub fn cancelled(&self, context: &str) -> EnhancedError {
        let error =
            EnhancedError::new(ErrorCode::Cancelled, "The operation was cancelled.", Severity::Info)
                .annotate_context(context);

        log_classification(context, "cancellation", &error);
        error
    }
}

fn log_classification(context: &str, raw: &str, classified: &EnhancedError) {
    debug!(
        timestamp = %Utc::now().to_rfc3339(),
        context,
        raw,
        code = %classified.code,
        retryable = classified.retryable,
        message = %classified.message,
        "classified operation failure"
    );
}

fn classify_http(status: u16, body: Option<&str>) -> EnhancedError {
    let code = ErrorCode::from_status(status);
    let severity = if code.is_transient() || matches!(code, ErrorCode::NotFound | ErrorCode::Conflict)
    {
        Severity::Warning
    } else {
        Severity::Error
    };

    let parsed = body.and_then(|b| serde_json::from_str::<Value>(b).ok());
    let message = parsed
        .as_ref()
        .and_then(|v| string_field(v, "message").or_else(|| string_field(v, "detail")))
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    let details = parsed.as_ref().and_then(|v| details_field(v));

    let mut error = EnhancedError::new(code, message, severity).with_status(status);
    error.details = details;
    error
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn details_field(value: &Value) -> Option<String> {
    match value.get("details")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(raw: impl Into<RawError>) -> EnhancedError {
        ErrorClassifier::new().classify(raw.into(), "")
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` with a debug-level subscriber and returns what it logged.
    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_503_is_retryable() {
        let err = classify(RawError::status(503));
        assert!(err.retryable);
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.status, Some(503));
        assert_eq!(err.message, "Request failed with status 503");
    }

    #[test]
    fn test_404_is_terminal() {
        let err = classify(RawError::status(404));
        assert!(!err.retryable);
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.severity, Severity::Warning);
    }

    #[test]
    fn test_500_is_terminal_http_error() {
        let err = classify(RawError::status(500));
        assert!(!err.retryable);
        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(err.severity, Severity::Error);
    }

    #[test]
    fn test_429_is_retryable() {
        let err = classify(RawError::status(429));
        assert!(err.retryable);
        assert_eq!(err.code, ErrorCode::RateLimited);
    }

    #[test]
    fn test_body_message_is_used() {
        let err = classify(RawError::http(
            400,
            r#"{"message": "Venue name is required", "details": "field: name"}"#,
        ));
        assert_eq!(err.message, "Venue name is required");
        assert_eq!(err.details.as_deref(), Some("field: name"));
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_body_detail_fallback() {
        let err = classify(RawError::http(422, r#"{"detail": "Invalid date range"}"#));
        assert_eq!(err.message, "Invalid date range");
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_structured_details_are_serialized() {
        let err = classify(RawError::http(
            422,
            r#"{"message": "Invalid", "details": [{"field": "start"}]}"#,
        ));
        assert_eq!(err.details.as_deref(), Some(r#"[{"field":"start"}]"#));
    }

    #[test]
    fn test_unparseable_body_falls_back() {
        let err = classify(RawError::http(502, "<html>Bad Gateway</html>"));
        assert_eq!(err.message, "Request failed with status 502");
        assert!(err.retryable);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_network_failure() {
        let err = classify(RawError::Network("connection refused".to_string()));
        assert_eq!(err.code, ErrorCode::Network);
        assert!(err.retryable);
        assert_eq!(err.message, NETWORK_MESSAGE);
        assert_eq!(err.details.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_exception_uses_its_message() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad payload");
        let err = classify(RawError::exception(io));
        assert_eq!(err.code, ErrorCode::UnknownError);
        assert!(!err.retryable);
        assert_eq!(err.message, "bad payload");
    }

    #[test]
    fn test_plain_string() {
        let err = classify("boom");
        assert_eq!(err.message, "boom");
        assert_eq!(err.code, ErrorCode::UnknownError);
        assert!(!err.retryable);
    }

    #[test]
    fn test_other_value() {
        let err = classify(serde_json::json!(42));
        assert_eq!(err.message, UNEXPECTED_MESSAGE);
        assert!(!err.retryable);
    }

    #[test]
    fn test_context_does_not_change_classification() {
        let classifier = ErrorClassifier::new();
        let plain = classifier.classify(RawError::status(503), "");
        let annotated = classifier.classify(RawError::status(503), "GET /api/crew");
        assert_eq!(plain.code, annotated.code);
        assert_eq!(plain.retryable, annotated.retryable);
        assert_eq!(annotated.details.as_deref(), Some("Context: GET /api/crew"));
    }

    #[test]
    fn test_classified_errors_pass_through() {
        let original = classify(RawError::status(503));
        let again = ErrorClassifier::new().classify(original.clone().into(), "other context");
        assert_eq!(again, original);
    }

    #[test]
    fn test_timeout_and_cancelled() {
        let classifier = ErrorClassifier::new();
        let timeout = classifier.timeout(Duration::from_millis(1500), "GET /api/shows");
        assert_eq!(timeout.code, ErrorCode::Timeout);
        assert!(timeout.retryable);
        assert_eq!(
            timeout.details.as_deref(),
            Some("Attempt timed out after 1500ms | Context: GET /api/shows")
        );

        let cancelled = classifier.cancelled("GET /api/shows");
        assert_eq!(cancelled.code, ErrorCode::Cancelled);
        assert!(!cancelled.retryable);
        assert_eq!(cancelled.severity, Severity::Info);
    }

    #[test]
    fn test_classification_is_logged() {
        let output = capture_logs(|| {
            ErrorClassifier::new().classify(RawError::status(503), "GET /api/shows");
        });

        assert!(output.contains("classified operation failure"), "{output}");
        assert!(output.contains("GET /api/shows"), "{output}");
        assert!(output.contains("http status 503"), "{output}");
        assert!(output.contains("SERVICE_UNAVAILABLE"), "{output}");
        assert!(output.contains("timestamp="), "{output}");
    }

    #[test]
    fn test_timeout_cancel_and_pass_through_are_logged() {
        let classifier = ErrorClassifier::new();
        let earlier = classify(RawError::status(409));

        let output = capture_logs(|| {
            classifier.timeout(Duration::from_secs(1), "GET /api/venues");
            classifier.cancelled("DELETE /api/shows/2");
            classifier.classify(earlier.into(), "PUT /api/shows/2");
        });

        assert!(output.contains("attempt timeout after 1000ms"), "{output}");
        assert!(output.contains("GET /api/venues"), "{output}");
        assert!(output.contains("code=TIMEOUT"), "{output}");
        assert!(output.contains("code=CANCELLED"), "{output}");
        assert!(output.contains("DELETE /api/shows/2"), "{output}");
        assert!(output.contains("code=CONFLICT"), "{output}");
        assert_eq!(output.matches("classified operation failure").count(), 3);
    }
}
