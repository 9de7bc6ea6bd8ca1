//! Error classification types for the resilient operation coordinator.
//!
//! Every failure that crosses into the coordinator is converted into an
//! [`EnhancedError`]: a user-facing message, a display severity, a taxonomy
//! code and a flag telling the coordinator whether to re-attempt.

use serde::{Deserialize, Serialize};

/// Display severity of a classified error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, e.g. an operation the user cancelled.
    Info,
    /// Recoverable or expected conditions.
    Warning,
    /// Failures that need the user's attention.
    #[default]
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Taxonomy tag attached to every classified error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The server could not be reached at all.
    Network,
    /// HTTP 429.
    RateLimited,
    /// HTTP 502.
    BadGateway,
    /// HTTP 503.
    ServiceUnavailable,
    /// HTTP 504.
    GatewayTimeout,
    /// A single attempt exceeded its configured time limit.
    Timeout,
    /// HTTP 400.
    BadRequest,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 409.
    Conflict,
    /// HTTP 422.
    ValidationError,
    /// Any other non-success HTTP status.
    HttpError,
    /// The caller cancelled the retry sequence.
    Cancelled,
    /// Anything that could not be classified more precisely.
    UnknownError,
}

impl ErrorCode {
    /// Maps an HTTP status to its taxonomy code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCode::BadRequest,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            422 => ErrorCode::ValidationError,
            429 => ErrorCode::RateLimited,
            502 => ErrorCode::BadGateway,
            503 => ErrorCode::ServiceUnavailable,
            504 => ErrorCode::GatewayTimeout,
            _ => ErrorCode::HttpError,
        }
    }

    /// Returns true for the transient conditions worth re-attempting.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::Network
                | ErrorCode::RateLimited
                | ErrorCode::BadGateway
                | ErrorCode::ServiceUnavailable
                | ErrorCode::GatewayTimeout
                | ErrorCode::Timeout
        )
    }

    /// Returns the wire form of the code, e.g. `"UNKNOWN_ERROR"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Network => "NETWORK",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::BadGateway => "BAD_GATEWAY",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::HttpError => "HTTP_ERROR",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical error record produced by classification.
///
/// `retryable` is only ever true for transient codes; see
/// [`ErrorCode::is_transient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedError {
    /// User-facing description.
    pub message: String,
    /// Display styling.
    pub severity: Severity,
    /// Whether the coordinator should re-attempt the operation.
    pub retryable: bool,
    /// Taxonomy tag.
    pub code: ErrorCode,
    /// Secondary diagnostic text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// HTTP status, when the failure came from a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl EnhancedError {
    /// Creates a classified error. Retryability follows from the code.
    pub fn new(code: ErrorCode, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            retryable: code.is_transient(),
            code,
            details: None,
            status: None,
        }
    }

    /// Sets the diagnostic details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Sets the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Appends `Context: <context>` to the details.
    ///
    /// Cosmetic only: never touches `code` or `retryable`.
    pub fn annotate_context(mut self, context: &str) -> Self {
        if context.is_empty() {
            return self;
        }
        let note = format!("Context: {context}");
        self.details = Some(match self.details.take() {
            Some(existing) if !existing.is_empty() => format!("{existing} | {note}"),
            _ => note,
        });
        self
    }

    /// Returns true if this error was caused by connectivity loss.
    pub fn is_network(&self) -> bool {
        self.code == ErrorCode::Network
    }
}

impl std::fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EnhancedError {}
