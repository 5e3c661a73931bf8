//! Diagnostic sinks.
//!
//! The library parser never aborts a multi-file load because of bad data.
//! Everything it finds is pushed into a [`Reporter`] instead, and the caller
//! decides whether that becomes a log, a dialog or a hard error.

use serde::Serialize;
use std::fmt;

/// Severity attached to every reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Action,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Action => "action",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Ordered sink for severity-tagged messages.
pub trait Reporter {
    fn report(&mut self, message: &str, severity: Severity);

    /// Whether anything has been reported so far.
    fn has_message(&self) -> bool;
}

/// A single message kept by [`CollectingReporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportMessage {
    pub severity: Severity,
    pub text: String,
}

/// Accumulates messages into one block of text, one line per message.
///
/// Used when the caller did not supply a reporter and wants a single error
/// back instead of inspecting individual messages.
#[derive(Debug, Default)]
pub struct StringReporter {
    text: String,
}

impl StringReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Reporter for StringReporter {
    fn report(&mut self, message: &str, _severity: Severity) {
        self.text.push_str(message);
        self.text.push('\n');
    }

    fn has_message(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Keeps every message with its severity, in emission order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CollectingReporter {
    messages: Vec<ReportMessage>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ReportMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ReportMessage> {
        self.messages
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages.iter().filter(|m| m.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, message: &str, severity: Severity) {
        self.messages.push(ReportMessage {
            severity,
            text: message.to_string(),
        });
    }

    fn has_message(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Forwards messages to the `tracing` log.
#[derive(Debug, Default)]
pub struct TracingReporter {
    reported: usize,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, message: &str, severity: Severity) {
        self.reported += 1;
        match severity {
            Severity::Error => tracing::error!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Info | Severity::Action => tracing::info!("{}", message),
            Severity::Debug => tracing::debug!("{}", message),
        }
    }

    fn has_message(&self) -> bool {
        self.reported > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_reporter_joins_lines() {
        let mut reporter = StringReporter::new();
        assert!(!reporter.has_message());

        reporter.report("first", Severity::Error);
        reporter.report("second", Severity::Warning);

        assert!(reporter.has_message());
        assert_eq!(reporter.text(), "first\nsecond\n");
    }

    #[test]
    fn test_collecting_reporter_keeps_order_and_severity() {
        let mut reporter = CollectingReporter::new();
        reporter.report("a", Severity::Error);
        reporter.report("b", Severity::Info);
        reporter.report("c", Severity::Error);

        let texts: Vec<_> = reporter.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(reporter.count(Severity::Error), 2);
        assert!(reporter.has_errors());
    }

    #[test]
    fn test_tracing_reporter_counts() {
        let mut reporter = TracingReporter::new();
        assert!(!reporter.has_message());
        reporter.report("logged", Severity::Warning);
        assert!(reporter.has_message());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Error).unwrap();
        assert_eq!(json, "\"error\"");
    }
}
