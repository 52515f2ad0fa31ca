//! # Bus Observers
//!
//! Subscription lifecycle policies and failure isolation for a host-owned,
//! synchronous event bus.
//!
//! ## Core Concepts
//!
//! - **Bus adapter**: the two operations needed from the host bus, register and deactivate
//! - **Policies**: Once, Persistent, Filtered and TimeBounded subscriptions
//! - **Exact delivery**: a subscription only sees events of exactly its type
//! - **Sanitizer**: callback failures are caught, trimmed and reported, never propagated
//!
//! ## Example
//!
//! ```
//! use bus_observers::{Event, LocalBus, Observers};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct Ping;
//! impl Event for Ping {}
//!
//! let bus = Arc::new(LocalBus::new());
//! let observers = Observers::new(Arc::clone(&bus));
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! observers.observe(move |_: &Ping| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! })?;
//!
//! bus.publish(&Ping);
//! bus.publish(&Ping);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! # Ok::<(), bus_observers::SubscriptionError>(())
//! ```

pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod sanitizer;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{BusAdapter, BusHandler, LocalBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ObserverConfig;
pub use error::{Result, SubscriptionError};
pub use event::{downcast, Event, EventIdentity};
pub use sanitizer::{
    BufferedSink, CallbackError, DiagnosticSink, Failure, Invocation, Sanitizer, TraceFilter,
    TracingSink,
};
pub use subscriptions::{
    DeactivationReason, DispatchPolicy, Observers, SubscriptionHandle, SubscriptionStats,
};
pub use types::*;
