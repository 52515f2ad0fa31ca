//! Failure containment around user callbacks.
//!
//! Every callback and predicate registered through [`Observers`](crate::Observers)
//! runs inside [`Sanitizer::invoke`], [`Sanitizer::try_invoke`] or
//! [`Sanitizer::evaluate`]. A failure,
//! whether a panic or a returned `Err`, stops at this boundary:
//! - the panic backtrace is captured and stripped of engine frames
//! - one report is written to the [`DiagnosticSink`], tagged with the event's
//!   type name
//! - control returns to the bus as if the callback had completed
//!
//! Panics are only contained when the crate is built with `panic = "unwind"`.

mod capture;
mod sink;
mod trace;

pub use sink::{BufferedSink, DiagnosticSink, TracingSink};
pub use trace::TraceFilter;

use crate::config::ObserverConfig;
use crate::types::{EventKind, Severity};
use std::fmt;
use std::sync::Arc;

/// Error type a fallible callback may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Stand-in for a failure whose own formatting panicked.
const UNFORMATTABLE: &str = "<failure could not be formatted>";

/// A contained callback failure.
#[derive(Debug)]
pub enum Failure {
    Panicked {
        message: String,
        location: Option<String>,
        backtrace: Option<String>,
    },
    Errored(CallbackError),
}

impl Failure {
    fn from_panic(captured: capture::CapturedPanic) -> Self {
        Failure::Panicked {
            message: captured.message,
            location: captured.location,
            backtrace: captured.backtrace,
        }
    }

    /// Full trace text with hidden frames removed.
    pub fn render(&self, filter: &TraceFilter) -> String {
        match self {
            Failure::Panicked {
                message,
                location,
                backtrace,
            } => {
                let mut out = match location {
                    Some(location) => format!("panicked at {location}:\n{message}"),
                    None => format!("panicked: {message}"),
                };
                if let Some(backtrace) = backtrace {
                    out.push_str("\nstack backtrace:\n");
                    out.push_str(&filter.strip(backtrace));
                }
                out
            }
            Failure::Errored(error) => {
                let mut out = error.to_string();
                let mut source = error.source();
                if source.is_some() {
                    out.push_str("\n\nCaused by:");
                }
                while let Some(cause) = source {
                    out.push_str(&format!("\n    {cause}"));
                    source = cause.source();
                }
                out
            }
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&TraceFilter::default()))
    }
}

/// Result of a sanitized invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invocation {
    Completed,
    Failed,
}

impl Invocation {
    pub fn failed(self) -> bool {
        self == Invocation::Failed
    }
}

/// Runs user logic and reports its failures instead of propagating them.
pub struct Sanitizer {
    sink: Arc<dyn DiagnosticSink>,
    filter: TraceFilter,
    severity: Severity,
    capture_backtraces: bool,
}

impl Sanitizer {
    /// Sanitizer with default filtering, reporting at `Info`.
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::from_config(sink, &ObserverConfig::default())
    }

    pub fn from_config(sink: Arc<dyn DiagnosticSink>, config: &ObserverConfig) -> Self {
        let filter = config
            .extra_frame_markers
            .iter()
            .fold(TraceFilter::default(), |filter, marker| {
                filter.with_marker(marker.as_str())
            });

        Self {
            sink,
            filter,
            severity: config.failure_severity,
            capture_backtraces: config.capture_backtraces,
        }
    }

    pub fn filter(&self) -> &TraceFilter {
        &self.filter
    }

    /// Run `callback(event)`. Never unwinds.
    pub fn invoke<E, F>(&self, kind: EventKind, callback: F, event: &E) -> Invocation
    where
        E: ?Sized,
        F: FnOnce(&E),
    {
        self.try_invoke(
            kind,
            |event: &E| -> Result<(), CallbackError> {
                callback(event);
                Ok(())
            },
            event,
        )
    }

    /// Run a fallible `callback(event)`. An `Err` is reported like a panic,
    /// without a backtrace. Never unwinds.
    pub fn try_invoke<E, F, Er>(&self, kind: EventKind, callback: F, event: &E) -> Invocation
    where
        E: ?Sized,
        F: FnOnce(&E) -> Result<(), Er>,
        Er: Into<CallbackError>,
    {
        let outcome = capture::guarded(self.capture_backtraces, || {
            callback(event).map_err(Into::<CallbackError>::into)
        });
        let failure = match outcome {
            Ok(Ok(())) => return Invocation::Completed,
            Ok(Err(error)) => Failure::Errored(error),
            Err(captured) => Failure::from_panic(captured),
        };

        self.report(kind, failure);
        Invocation::Failed
    }

    /// Run `predicate(event)`. Returns `None` if the predicate panicked.
    pub fn evaluate<E, P>(&self, kind: EventKind, predicate: P, event: &E) -> Option<bool>
    where
        E: ?Sized,
        P: FnOnce(&E) -> bool,
    {
        match capture::guarded(self.capture_backtraces, || predicate(event)) {
            Ok(matched) => Some(matched),
            Err(captured) => {
                self.report(kind, Failure::from_panic(captured));
                None
            }
        }
    }

    /// Every step here that can reach host code runs under its own guard.
    fn report(&self, kind: EventKind, failure: Failure) {
        let trace = capture::guarded(false, || failure.render(&self.filter))
            .unwrap_or_else(|_| UNFORMATTABLE.to_string());
        let _ = capture::guarded(false, move || drop(failure));

        let message = format!(
            "An unhandled failure was intercepted whilst handling {}: \n{}",
            kind.name(),
            trace
        );
        if capture::guarded(false, || self.sink.emit(self.severity, &message)).is_err() {
            tracing::error!(
                event = kind.name(),
                "diagnostic sink panicked while reporting a failure"
            );
        }
    }
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sanitizer")
            .field("filter", &self.filter)
            .field("severity", &self.severity)
            .field("capture_backtraces", &self.capture_backtraces)
            .finish_non_exhaustive()
    }
}
