//! Toast renderer for terminal hosts.
//!
//! Renders classified errors as bordered panels, colored by severity, and
//! retry events as single-line notices.

use owo_colors::{OwoColorize, Rgb};

use crate::coordinator::RetryEvent;
use crate::error::{EnhancedError, Severity};

/// Colors used per severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToastTheme {
    /// Info color - blue (59, 130, 246)
    pub info: Rgb,
    /// Warning color - yellow (234, 179, 8)
    pub warning: Rgb,
    /// Error color - red (239, 68, 68)
    pub error: Rgb,
    /// Secondary text - gray (107, 114, 128)
    pub muted: Rgb,
}

impl Default for ToastTheme {
    fn default() -> Self {
        Self {
            info: Rgb(59, 130, 246),
            warning: Rgb(234, 179, 8),
            error: Rgb(239, 68, 68),
            muted: Rgb(107, 114, 128),
        }
    }
}

impl ToastTheme {
    fn for_severity(&self, severity: Severity) -> Rgb {
        match severity {
            Severity::Info => self.info,
            Severity::Warning => self.warning,
            Severity::Error => self.error,
        }
    }
}

/// Renders [`EnhancedError`]s as terminal toasts.
#[derive(Debug, Clone)]
pub struct ToastRenderer {
    theme: ToastTheme,
    width: usize,
    color: bool,
}

impl Default for ToastRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastRenderer {
    /// Creates a colored renderer, 60 columns wide.
    pub fn new() -> Self {
        Self {
            theme: ToastTheme::default(),
            width: 60,
            color: true,
        }
    }

    /// Sets the panel width. Widths below 20 are raised to 20.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    /// Enables or disables ANSI colors.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Colors per severity.
    pub fn with_theme(mut self, theme: ToastTheme) -> Self {
        self.theme = theme;
        self
    }

    fn paint(&self, text: &str, rgb: Rgb, bold: bool) -> String {
        match (self.color, bold) {
            (false, _) => text.to_string(),
            (true, true) => text.color(rgb).bold().to_string(),
            (true, false) => text.color(rgb).to_string(),
        }
    }

    /// Truncates to `max_chars` characters, respecting UTF-8 boundaries.
    fn safe_truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", truncated)
        }
    }

    fn title(error: &EnhancedError) -> &'static str {
        match error.severity {
            Severity::Info => "Notice",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Renders a bordered toast for a classified error.
    pub fn render(&self, error: &EnhancedError) -> String {
        let accent = self.theme.for_severity(error.severity);
        let inner_width = self.width - 2;
        let border = "─".repeat(inner_width);
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.paint(&border, accent, false)));

        let header = format!("{} [{}]", Self::title(error), error.code);
        output.push_str(&format!(" {}\n", self.paint(&header, accent, true)));
        output.push_str(&format!("{}\n", self.paint(&border, accent, false)));

        let message = Self::safe_truncate(&error.message, inner_width - 1);
        output.push_str(&format!(" {}\n", message));

        if let Some(details) = error.details.as_deref() {
            let details = Self::safe_truncate(details, inner_width - 1);
            output.push_str(&format!(" {}\n", self.paint(&details, self.theme.muted, false)));
        }

        if error.retryable {
            let hint = "This looks temporary. Try again in a moment.";
            output.push_str(&format!(" {}\n", self.paint(hint, self.theme.muted, false)));
        }

        output.push_str(&self.paint(&border, accent, false));
        output
    }

    /// Renders a one-line notice for a pending retry.
    pub fn render_retry(&self, event: &RetryEvent) -> String {
        let secs = event.delay.as_secs_f64();
        let line = format!(
            "Retry {}/{} for {} in {:.1}s: {}",
            event.attempt, event.max_retries, event.operation_id, secs, event.error.message
        );
        let line = Self::safe_truncate(&line, self.width);
        self.paint(&line, self.theme.warning, false)
    }
}
