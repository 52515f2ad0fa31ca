//! The capability required from a host event bus.

use crate::error::Result;
use crate::event::Event;
use crate::types::{BusToken, EventKind, Priority};
use std::sync::Arc;

/// Handler installed on the bus. Receives exactly one event per call.
pub type BusHandler = Arc<dyn Fn(&dyn Event) + Send + Sync>;

/// Host bus contract.
///
/// `register` installs a handler for every event the bus files under `kind`.
/// The bus may deliver events whose exact kind differs from `kind` (for
/// example members of a broader family); the engine filters those itself.
/// Several handlers may be registered for the same kind without interfering.
///
/// After `deactivate(token)` returns, the handler for `token` must not be
/// invoked again. Deactivating an unknown or already removed token is a no-op.
///
/// Handlers are invoked synchronously on the bus's own dispatch thread. The
/// engine adds no ordering guarantees across threads beyond what the bus
/// provides.
pub trait BusAdapter: Send + Sync {
    fn register(&self, kind: EventKind, priority: Priority, handler: BusHandler) -> Result<BusToken>;

    fn deactivate(&self, token: BusToken);
}

impl<B> BusAdapter for Arc<B>
where
    B: BusAdapter + ?Sized,
{
    fn register(&self, kind: EventKind, priority: Priority, handler: BusHandler) -> Result<BusToken> {
        (**self).register(kind, priority, handler)
    }

    fn deactivate(&self, token: BusToken) {
        (**self).deactivate(token)
    }
}
