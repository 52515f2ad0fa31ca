//! Subscription state and the handle returned to callers.

use crate::bus::BusAdapter;
use crate::sanitizer::Invocation;
use crate::types::{BusToken, EventKind, Priority, SubscriptionId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Why a subscription went inactive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeactivationReason {
    /// The caller cancelled it through its handle.
    Cancelled,
    /// A one-shot subscription received its event.
    Handled,
    /// A time-bounded subscription saw a delivery after its deadline.
    Expired,
}

/// Delivery counters for one subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Callback invocations, including failed ones.
    pub invoked: u64,
    /// Invocations whose callback failed.
    pub failed: u64,
    /// Deliveries rejected by a filter predicate.
    pub declined: u64,
    /// Deliveries dropped because the event's exact kind did not match.
    pub ignored: u64,
}

/// State shared by a handle and the bridge installed on the bus.
pub(crate) struct SubscriptionState {
    id: SubscriptionId,
    kind: EventKind,
    priority: Priority,
    active: AtomicBool,
    token: OnceLock<BusToken>,
    bus: Weak<dyn BusAdapter>,
    invoked: AtomicU64,
    failed: AtomicU64,
    declined: AtomicU64,
    ignored: AtomicU64,
}

impl SubscriptionState {
    pub(crate) fn new(
        id: SubscriptionId,
        kind: EventKind,
        priority: Priority,
        bus: &Arc<dyn BusAdapter>,
    ) -> Self {
        Self {
            id,
            kind,
            priority,
            active: AtomicBool::new(true),
            token: OnceLock::new(),
            bus: Arc::downgrade(bus),
            invoked: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            declined: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn kind(&self) -> EventKind {
        self.kind
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flip to inactive and stop bus routing. Only the first call does
    /// anything; returns whether this call was it.
    pub(crate) fn deactivate(&self, reason: DeactivationReason) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.release_route();
        tracing::debug!(id = self.id.0, kind = %self.kind, ?reason, "subscription deactivated");
        true
    }

    /// Record the token the bus issued for this subscription.
    pub(crate) fn bind(&self, token: BusToken) {
        let _ = self.token.set(token);
        // Deactivated while the bus was still registering us.
        if !self.is_active() {
            self.release_route();
        }
    }

    fn release_route(&self) {
        let Some(token) = self.token.get() else {
            return;
        };
        if let Some(bus) = self.bus.upgrade() {
            bus.deactivate(*token);
        }
    }

    pub(crate) fn record_invocation(&self, invocation: Invocation) {
        self.invoked.fetch_add(1, Ordering::Relaxed);
        if invocation.failed() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_declined(&self) {
        self.declined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            invoked: self.invoked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            declined: self.declined.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a registered subscription.
///
/// Dropping the handle leaves the subscription in place; only [`cancel`],
/// the subscription's own policy, or bus teardown remove it.
///
/// [`cancel`]: SubscriptionHandle::cancel
#[derive(Clone)]
pub struct SubscriptionHandle {
    state: Arc<SubscriptionState>,
}

impl SubscriptionHandle {
    pub(crate) fn new(state: Arc<SubscriptionState>) -> Self {
        Self { state }
    }

    pub fn id(&self) -> SubscriptionId {
        self.state.id
    }

    /// Exact event kind observed.
    pub fn kind(&self) -> EventKind {
        self.state.kind
    }

    pub fn priority(&self) -> Priority {
        self.state.priority
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Deactivate the subscription. Takes effect for every later delivery;
    /// repeated calls are no-ops.
    pub fn cancel(&self) {
        self.state.deactivate(DeactivationReason::Cancelled);
    }

    pub fn stats(&self) -> SubscriptionStats {
        self.state.stats()
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.state.id)
            .field("kind", &self.state.kind)
            .field("priority", &self.state.priority)
            .field("active", &self.is_active())
            .finish()
    }
}
