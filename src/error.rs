//! Error types for subscription registration.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by registration and bus adapters.
///
/// Failures raised by user callbacks never appear here; the sanitizer contains
/// and reports them.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Bus rejected registration for {kind}: {reason}")]
    BusRejected { kind: String, reason: String },

    #[error("Bus is shut down")]
    BusClosed,

    #[error("Deadline overflow: {0:?} from now is not representable")]
    DeadlineOverflow(Duration),
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
