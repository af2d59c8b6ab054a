//! Diagnostics sink for non-fatal error reporting.
//!
//! No error in the reconciliation engine is fatal: failed pulls, dropped
//! events, and render failures are all recovered locally and surfaced only
//! through this sink. Implementations must be fire-and-forget and must not
//! panic back into the engine.

use std::sync::Arc;

use tracing::{error, info};

/// Severity of a diagnostics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// Receiver of non-fatal error reports from the engine.
pub trait Diagnostics: Send + Sync {
    /// Report a message. Must not block or panic.
    fn report(&self, message: &str, severity: Severity);
}

/// Arc wrapper for Diagnostics trait objects.
pub type DynDiagnostics = Arc<dyn Diagnostics>;

/// Default sink that routes reports into the tracing log.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(target: "posboard", "{message}"),
            Severity::Error => error!(target: "posboard", "{message}"),
        }
    }
}

/// Collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    reports: parking_lot::Mutex<Vec<(Severity, String)>>,
}

impl CollectingDiagnostics {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded reports.
    pub fn reports(&self) -> Vec<(Severity, String)> {
        self.reports.lock().clone()
    }

    /// Count recorded error reports.
    pub fn error_count(&self) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|(severity, _)| *severity == Severity::Error)
            .count()
    }

    /// Clear recorded reports.
    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, message: &str, severity: Severity) {
        self.reports.lock().push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_records_and_counts() {
        let sink = CollectingDiagnostics::new();

        sink.report("pull ok", Severity::Info);
        sink.report("pull failed", Severity::Error);
        sink.report("render failed", Severity::Error);

        assert_eq!(sink.reports().len(), 3);
        assert_eq!(sink.error_count(), 2);

        sink.clear();
        assert!(sink.reports().is_empty());
    }
}
