//! Notification sinks for classified errors.
//!
//! The binding layer forwards terminal failures to a [`NotificationSink`]
//! unless the caller suppresses it. The host UI provides its own sink; the
//! implementations here cover terminals, logs, and channels.

mod renderer;

pub use renderer::{ToastRenderer, ToastTheme};

use std::io::Write;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::{EnhancedError, Severity};

/// Receives errors that should be shown to the user.
///
/// Implementations must not block and must not panic.
pub trait NotificationSink: Send + Sync {
    fn show_error(&self, error: &EnhancedError);
}

impl<F> NotificationSink for F
where
    F: Fn(&EnhancedError) + Send + Sync,
{
    fn show_error(&self, error: &EnhancedError) {
        self(error)
    }
}

/// Writes rendered toasts to stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    renderer: ToastRenderer,
}

impl ConsoleSink {
    /// Prints through `renderer`.
    pub fn new(renderer: ToastRenderer) -> Self {
        Self { renderer }
    }
}

impl NotificationSink for ConsoleSink {
    fn show_error(&self, error: &EnhancedError) {
        let toast = self.renderer.render(error);
        // A closed stderr is not worth failing over.
        let _ = writeln!(std::io::stderr().lock(), "{toast}");
    }
}

/// Emits errors as tracing events at a level matching their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn show_error(&self, err: &EnhancedError) {
        let details = err.details.as_deref().unwrap_or("");
        match err.severity {
            Severity::Info => info!(code = %err.code, details, "{}", err.message),
            Severity::Warning => warn!(code = %err.code, details, "{}", err.message),
            Severity::Error => error!(code = %err.code, details, "{}", err.message),
        }
    }
}

/// Forwards errors into an unbounded channel, e.g. for a UI event loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<EnhancedError>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its errors arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EnhancedError>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn show_error(&self, error: &EnhancedError) {
        // Nobody listening means nobody to notify.
        let _ = self.sender.send(error.clone());
    }
}
