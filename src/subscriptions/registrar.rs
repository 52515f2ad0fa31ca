//! Registration façade binding callbacks and policies to a bus.

use crate::bus::{BusAdapter, BusHandler};
use crate::clock::{Clock, SystemClock};
use crate::config::ObserverConfig;
use crate::error::{Result, SubscriptionError};
use crate::event::{downcast, Event};
use crate::sanitizer::{CallbackError, DiagnosticSink, Sanitizer, TracingSink};
use crate::types::{EventKind, Priority, SubscriptionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::handle::{SubscriptionHandle, SubscriptionState};
use super::policy::DispatchPolicy;

/// Registers subscriptions on a bus.
///
/// The bus is injected at construction; `Observers` keeps a strong reference
/// to it while the handlers it installs only hold weak ones.
pub struct Observers {
    bus: Arc<dyn BusAdapter>,
    sanitizer: Arc<Sanitizer>,
    sink: Arc<dyn DiagnosticSink>,
    clock: Arc<dyn Clock>,
    config: ObserverConfig,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl Observers {
    /// Façade with the default configuration, reporting failures to `tracing`.
    pub fn new<B: BusAdapter + 'static>(bus: Arc<B>) -> Self {
        Self::with_config(bus, ObserverConfig::default())
    }

    /// Create a façade with an explicit configuration.
    pub fn with_config<B: BusAdapter + 'static>(bus: Arc<B>, config: ObserverConfig) -> Self {
        let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
        Self {
            bus,
            sanitizer: Arc::new(Sanitizer::from_config(Arc::clone(&sink), &config)),
            sink,
            clock: Arc::new(SystemClock),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Report contained failures to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sanitizer = Arc::new(Sanitizer::from_config(Arc::clone(&sink), &self.config));
        self.sink = sink;
        self
    }

    /// Use `clock` for deadlines and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration this façade was built with.
    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// The sink receiving failure reports.
    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    /// Install `policy` for events of exactly type `T`.
    pub fn register<T: Event>(
        &self,
        priority: Priority,
        policy: DispatchPolicy<T>,
    ) -> Result<SubscriptionHandle> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let kind = EventKind::of::<T>();
        let policy_name = policy.name();
        let state = Arc::new(SubscriptionState::new(id, kind, priority, &self.bus));

        let handler = self.bridge(Arc::clone(&state), policy);
        let token = self.bus.register(kind, priority, handler)?;
        state.bind(token);

        tracing::debug!(
            id = id.0,
            kind = %kind,
            ?priority,
            policy = policy_name,
            "subscription registered"
        );
        Ok(SubscriptionHandle::new(state))
    }

    /// Handler the bus calls: exact-kind check, then the policy.
    fn bridge<T: Event>(&self, state: Arc<SubscriptionState>, policy: DispatchPolicy<T>) -> BusHandler {
        let sanitizer = Arc::clone(&self.sanitizer);
        let clock = Arc::clone(&self.clock);
        let log_ignored = self.config.log_ignored_deliveries;

        Arc::new(move |event: &dyn Event| {
            let Some(typed) = downcast::<T>(event) else {
                state.record_ignored();
                if log_ignored {
                    tracing::trace!(
                        id = state.id().0,
                        expected = %state.kind(),
                        delivered = %event.kind(),
                        "ignored delivery of a different event kind"
                    );
                }
                return;
            };

            if !state.is_active() {
                return;
            }
            policy.dispatch(typed, &state, &sanitizer, clock.as_ref());
        })
    }

    fn deadline_after(&self, duration: Duration) -> Result<Instant> {
        self.clock
            .now()
            .checked_add(duration)
            .ok_or(SubscriptionError::DeadlineOverflow(duration))
    }

    // --- One-shot ---

    /// Handle the next `T` once, then stop.
    pub fn observe<T, F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe_with_priority(self.config.default_priority, callback)
    }

    /// [`observe`](Self::observe) at an explicit priority.
    pub fn observe_with_priority<T, F>(
        &self,
        priority: Priority,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(priority, DispatchPolicy::once(callback))
    }

    /// [`observe`](Self::observe) for a callback that can return an error.
    pub fn try_observe<T, F, E>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        self.register(self.config.default_priority, DispatchPolicy::try_once(callback))
    }

    // --- Persistent ---

    /// Handle every `T` until cancelled or the bus tears down.
    pub fn observe_all<T, F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe_all_with_priority(self.config.default_priority, callback)
    }

    /// [`observe_all`](Self::observe_all) at an explicit priority.
    pub fn observe_all_with_priority<T, F>(
        &self,
        priority: Priority,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(priority, DispatchPolicy::persistent(callback))
    }

    /// [`observe_all`](Self::observe_all) for a callback that can return an error.
    pub fn try_observe_all<T, F, E>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        self.register(
            self.config.default_priority,
            DispatchPolicy::try_persistent(callback),
        )
    }

    // --- Filtered ---

    /// Handle every `T` for which `predicate` holds.
    pub fn observe_if<T, F, P>(&self, callback: F, predicate: P) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.observe_if_with_priority(self.config.default_priority, callback, predicate)
    }

    /// [`observe_if`](Self::observe_if) at an explicit priority.
    pub fn observe_if_with_priority<T, F, P>(
        &self,
        priority: Priority,
        callback: F,
        predicate: P,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.register(priority, DispatchPolicy::filtered(callback, predicate))
    }

    /// [`observe_if`](Self::observe_if) for a callback that can return an error.
    pub fn try_observe_if<T, F, E, P>(
        &self,
        callback: F,
        predicate: P,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.register(
            self.config.default_priority,
            DispatchPolicy::try_filtered(callback, predicate),
        )
    }

    // --- Time-bounded ---

    /// Handle every `T` delivered within `duration` from now.
    pub fn observe_for<T, F>(&self, callback: F, duration: Duration) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe_for_with_priority(self.config.default_priority, callback, duration)
    }

    /// [`observe_for`](Self::observe_for) at an explicit priority.
    pub fn observe_for_with_priority<T, F>(
        &self,
        priority: Priority,
        callback: F,
        duration: Duration,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.observe_for_timed_with_priority(priority, move |event: &T, _| callback(event), duration)
    }

    /// Like [`observe_for`](Self::observe_for), passing the time left until
    /// the deadline to the callback.
    pub fn observe_for_timed<T, F>(
        &self,
        callback: F,
        duration: Duration,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T, Duration) + Send + Sync + 'static,
    {
        self.observe_for_timed_with_priority(self.config.default_priority, callback, duration)
    }

    /// [`observe_for_timed`](Self::observe_for_timed) at an explicit priority.
    pub fn observe_for_timed_with_priority<T, F>(
        &self,
        priority: Priority,
        callback: F,
        duration: Duration,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T, Duration) + Send + Sync + 'static,
    {
        let deadline = self.deadline_after(duration)?;
        self.register(priority, DispatchPolicy::time_bounded(deadline, callback))
    }

    /// [`observe_for_timed`](Self::observe_for_timed) for a callback that can
    /// return an error.
    pub fn try_observe_for_timed<T, F, E>(
        &self,
        callback: F,
        duration: Duration,
    ) -> Result<SubscriptionHandle>
    where
        T: Event,
        F: Fn(&T, Duration) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        let deadline = self.deadline_after(duration)?;
        self.register(
            self.config.default_priority,
            DispatchPolicy::try_time_bounded(deadline, callback),
        )
    }
}
