//! Destinations for diagnostic messages.

use crate::types::Severity;
use parking_lot::Mutex;

/// Receives the formatted report of each contained failure.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str);
}

/// Forwards diagnostics to `tracing` at the matching level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => tracing::trace!("{}", message),
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warn => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }
}

/// Keeps diagnostics in memory until drained.
#[derive(Debug, Default)]
pub struct BufferedSink {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of everything emitted so far.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.lock().clone()
    }

    /// Take everything emitted so far.
    pub fn drain(&self) -> Vec<(Severity, String)> {
        std::mem::take(&mut *self.entries.lock())
    }
}

impl DiagnosticSink for BufferedSink {
    fn emit(&self, severity: Severity, message: &str) {
        self.entries.lock().push((severity, message.to_string()));
    }
}
