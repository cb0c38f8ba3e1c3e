//! Diagnostics sink for the Morph customization compiler.
//!
//! Compilation never aborts on bad content: user errors degrade the
//! offending subtree to a placeholder and land here instead, so the host
//! always receives a complete program plus the full list of problems.
//! The sink is append-only and thread-safe; mesh generation tasks report
//! from worker threads without any coordination beyond the sink's own
//! lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Severity of a reported message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Deduplication bin for messages prone to repetition.
///
/// The sink stores every message; bins exist so the host can rate-limit
/// display of duplicate-prone families without losing the rest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum SpamBin {
    #[default]
    Unbounded,
    UnknownTag,
    MissingConnection,
}

/// Opaque pointer back to the authoring-side source of a message.
///
/// The compiler threads these through without interpreting them; the host
/// uses them to focus its UI on the offending graph node.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct MessageContext(Option<Arc<str>>);

impl MessageContext {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        MessageContext(Some(label.into()))
    }

    pub fn none() -> Self {
        MessageContext(None)
    }

    pub fn label(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// One reported message.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub context: MessageContext,
    /// Secondary context for messages that relate two graph locations.
    pub related_context: Option<MessageContext>,
    pub bin: SpamBin,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(label) = self.context.label() {
            write!(f, " [{label}]")?;
        }
        Ok(())
    }
}

/// Thread-safe append-only collector of diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    /// Append a message.
    pub fn add(
        &self,
        message: impl Into<String>,
        severity: Severity,
        context: MessageContext,
        bin: SpamBin,
    ) {
        self.entries.lock().push(Diagnostic {
            severity,
            message: message.into(),
            context,
            related_context: None,
            bin,
        });
    }

    /// Append a message relating two graph locations.
    pub fn add_related(
        &self,
        message: impl Into<String>,
        severity: Severity,
        context: MessageContext,
        related: MessageContext,
        bin: SpamBin,
    ) {
        self.entries.lock().push(Diagnostic {
            severity,
            message: message.into(),
            context,
            related_context: Some(related),
            bin,
        });
    }

    /// Append an error in the unbounded bin.
    pub fn error(&self, message: impl Into<String>, context: MessageContext) {
        self.add(message, Severity::Error, context, SpamBin::Unbounded);
    }

    /// Append a warning in the unbounded bin.
    pub fn warning(&self, message: impl Into<String>, context: MessageContext) {
        self.add(message, Severity::Warning, context, SpamBin::Unbounded);
    }

    /// Append an informational note.
    pub fn info(&self, message: impl Into<String>, context: MessageContext) {
        self.add(message, Severity::Info, context, SpamBin::Unbounded);
    }

    /// Move every entry of `other` into this sink, preserving order.
    pub fn merge(&self, other: &DiagnosticSink) {
        let mut drained = {
            let mut theirs = other.entries.lock();
            std::mem::take(&mut *theirs)
        };
        self.entries.lock().append(&mut drained);
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_count() {
        let sink = DiagnosticSink::new();
        sink.error("missing mesh", MessageContext::new("surface 'Head'"));
        sink.warning("unused tag", MessageContext::none());
        sink.info("note", MessageContext::none());

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(Severity::Error), 1);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn merge_preserves_order_and_drains_source() {
        let a = DiagnosticSink::new();
        let b = DiagnosticSink::new();
        a.error("first", MessageContext::none());
        b.warning("second", MessageContext::none());
        b.warning("third", MessageContext::none());

        a.merge(&b);

        let entries = a.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].message, "second");
        assert_eq!(entries[2].message, "third");
        assert!(b.is_empty());
    }

    #[test]
    fn spam_bin_is_recorded() {
        let sink = DiagnosticSink::new();
        sink.add(
            "unknown tag 'Foo'",
            Severity::Warning,
            MessageContext::none(),
            SpamBin::UnknownTag,
        );
        assert_eq!(sink.entries()[0].bin, SpamBin::UnknownTag);
    }

    #[test]
    fn sink_is_shareable_across_threads() {
        let sink = std::sync::Arc::new(DiagnosticSink::new());
        let mut handles = Vec::new();
        for i in 0..4 {
            let sink = std::sync::Arc::clone(&sink);
            handles.push(std::thread::spawn(move || {
                sink.warning(format!("from thread {i}"), MessageContext::none());
            }));
        }
        for handle in handles {
            handle.join().ok();
        }
        assert_eq!(sink.len(), 4);
    }
}
