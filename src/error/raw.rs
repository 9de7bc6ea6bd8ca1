//! Raw failures as they arrive from wrapped operations.

use std::io;

/// A failure before classification.
///
/// Operations may fail with anything convertible into a `RawError`; the
/// classifier turns it into an [`EnhancedError`](super::EnhancedError).
#[derive(Debug)]
pub enum RawError {
    /// A non-success HTTP response, with its body if it could be read.
    Http { status: u16, body: Option<String> },
    /// The connection itself failed (DNS, refused, reset, transport timeout).
    Network(String),
    /// Any other error value.
    Exception(Box<dyn std::error::Error + Send + Sync>),
    /// A plain message.
    Message(String),
    /// Any other value.
    Other(serde_json::Value),
    /// An error that was already classified further upstream.
    Classified(super::EnhancedError),
}

impl RawError {
    /// Builds an HTTP failure without a body.
    pub fn status(status: u16) -> Self {
        RawError::Http { status, body: None }
    }

    /// Builds an HTTP failure with a body.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        RawError::Http {
            status,
            body: Some(body.into()),
        }
    }

    /// Wraps an arbitrary error value.
    pub fn exception<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RawError::Exception(Box::new(err))
    }

    /// Converts a non-success response, reading its body.
    ///
    /// A body that cannot be read is treated as absent.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.ok().filter(|b| !b.is_empty());
        RawError::Http { status, body }
    }

    /// Short description used in diagnostics logging.
    pub fn describe(&self) -> String {
        match self {
            RawError::Http { status, body } => match body {
                Some(body) => format!("http status {status}: {body}"),
                None => format!("http status {status}"),
            },
            RawError::Network(msg) => format!("network failure: {msg}"),
            RawError::Exception(err) => format!("exception: {err}"),
            RawError::Message(msg) => format!("message: {msg}"),
            RawError::Other(value) => format!("value: {value}"),
            RawError::Classified(err) => format!("classified {}: {}", err.code, err.message),
        }
    }
}

impl From<&str> for RawError {
    fn from(msg: &str) -> Self {
        RawError::Message(msg.to_string())
    }
}

impl From<String> for RawError {
    fn from(msg: String) -> Self {
        RawError::Message(msg)
    }
}

impl From<serde_json::Value> for RawError {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(msg) => RawError::Message(msg),
            other => RawError::Other(other),
        }
    }
}

impl From<reqwest::Error> for RawError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return RawError::status(status.as_u16());
        }
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return RawError::Network(err.to_string());
        }
        RawError::exception(err)
    }
}

impl From<io::Error> for RawError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut => RawError::Network(err.to_string()),
            _ => RawError::exception(err),
        }
    }
}

impl From<super::EnhancedError> for RawError {
    fn from(err: super::EnhancedError) -> Self {
        RawError::Classified(err)
    }
}
