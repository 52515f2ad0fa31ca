//! Engine configuration.

use crate::types::{Priority, Severity};
use serde::{Deserialize, Serialize};

/// Configuration for an [`Observers`](crate::Observers) façade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Priority used by the registration variants that take none.
    /// Default: `Normal`
    pub default_priority: Priority,

    /// Severity of the diagnostic emitted for each contained failure.
    /// Default: `Info`
    pub failure_severity: Severity,

    /// Capture a backtrace when a callback panics.
    /// Default: true
    pub capture_backtraces: bool,

    /// Extra symbol fragments whose frames are hidden from reported traces.
    pub extra_frame_markers: Vec<String>,

    /// Emit a trace-level log for deliveries dropped by the exact-type check.
    /// Default: false
    pub log_ignored_deliveries: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::Normal,
            failure_severity: Severity::Info,
            capture_backtraces: true,
            extra_frame_markers: Vec::new(),
            log_ignored_deliveries: false,
        }
    }
}
