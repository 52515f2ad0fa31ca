//! In-process bus for hosts without one, and for tests.

use crate::error::{Result, SubscriptionError};
use crate::event::Event;
use crate::types::{BusToken, EventKind, Priority};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::adapter::{BusAdapter, BusHandler};

/// One installed handler.
struct Route {
    token: BusToken,
    priority: Priority,
    handler: BusHandler,
}

#[derive(Default)]
struct Routes {
    /// Handler lists by family, sorted by priority then registration order.
    by_family: HashMap<EventKind, Vec<Route>>,
    /// Family of each live token.
    index: HashMap<BusToken, EventKind>,
    closed: bool,
}

/// Synchronous bus routing events by [`Event::family`].
pub struct LocalBus {
    routes: RwLock<Routes>,
    /// Counter for generating tokens.
    next_token: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Routes::default()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Deliver `event` to every handler filed under its family.
    ///
    /// The handler list is snapshotted up front and the lock released before
    /// any handler runs, so handlers may register or deactivate freely. A
    /// handler deactivated earlier in the same dispatch is skipped. Returns the
    /// number of handlers invoked.
    pub fn publish(&self, event: &dyn Event) -> usize {
        let family = event.family();
        let snapshot: Vec<(BusToken, BusHandler)> = {
            let routes = self.routes.read();
            match routes.by_family.get(&family) {
                Some(list) => list
                    .iter()
                    .map(|route| (route.token, BusHandler::clone(&route.handler)))
                    .collect(),
                None => return 0,
            }
        };

        let mut invoked = 0;
        for (token, handler) in snapshot {
            if !self.routes.read().index.contains_key(&token) {
                continue;
            }
            handler(event);
            invoked += 1;
        }
        invoked
    }

    /// Number of live handlers.
    pub fn route_count(&self) -> usize {
        self.routes.read().index.len()
    }

    /// Number of live handlers filed under `family`.
    pub fn route_count_for(&self, family: EventKind) -> usize {
        self.routes
            .read()
            .by_family
            .get(&family)
            .map_or(0, Vec::len)
    }

    /// Remove every handler and refuse further registrations.
    pub fn shutdown(&self) {
        let mut routes = self.routes.write();
        let removed = routes.index.len();
        routes.by_family.clear();
        routes.index.clear();
        routes.closed = true;
        tracing::debug!(removed, "local bus shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.routes.read().closed
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusAdapter for LocalBus {
    fn register(&self, kind: EventKind, priority: Priority, handler: BusHandler) -> Result<BusToken> {
        let mut routes = self.routes.write();
        if routes.closed {
            return Err(SubscriptionError::BusClosed);
        }

        let token = BusToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let list = routes.by_family.entry(kind).or_default();
        // Insert after every route of equal or lower priority.
        let at = list.partition_point(|route| route.priority <= priority);
        list.insert(
            at,
            Route {
                token,
                priority,
                handler,
            },
        );
        routes.index.insert(token, kind);

        Ok(token)
    }

    fn deactivate(&self, token: BusToken) {
        let mut routes = self.routes.write();
        let Some(family) = routes.index.remove(&token) else {
            return;
        };

        let now_empty = match routes.by_family.get_mut(&family) {
            Some(list) => {
                list.retain(|route| route.token != token);
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            routes.by_family.remove(&family);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Tick;
    impl Event for Tick {}

    struct Tock;
    impl Event for Tock {}

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BusHandler {
        let log = Arc::clone(log);
        Arc::new(move |_event: &dyn Event| log.lock().push(name))
    }

    #[test]
    fn test_register_deactivate() {
        let bus = LocalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let token = bus
            .register(EventKind::of::<Tick>(), Priority::Normal, recorder(&log, "a"))
            .unwrap();
        assert_eq!(bus.route_count(), 1);
        assert_eq!(bus.publish(&Tick), 1);

        bus.deactivate(token);
        bus.deactivate(token);
        assert_eq!(bus.route_count(), 0);
        assert_eq!(bus.route_count_for(EventKind::of::<Tick>()), 0);
        assert_eq!(bus.publish(&Tick), 0);
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn test_priority_order() {
        let bus = LocalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let kind = EventKind::of::<Tick>();

        bus.register(kind, Priority::Monitor, recorder(&log, "monitor")).unwrap();
        bus.register(kind, Priority::Normal, recorder(&log, "normal-1")).unwrap();
        bus.register(kind, Priority::Lowest, recorder(&log, "lowest")).unwrap();
        bus.register(kind, Priority::Normal, recorder(&log, "normal-2")).unwrap();

        bus.publish(&Tick);
        assert_eq!(*log.lock(), vec!["lowest", "normal-1", "normal-2", "monitor"]);
    }

    #[test]
    fn test_routes_by_family() {
        let bus = LocalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register(EventKind::of::<Tick>(), Priority::Normal, recorder(&log, "tick"))
            .unwrap();

        assert_eq!(bus.publish(&Tock), 0);
        assert_eq!(bus.publish(&Tick), 1);
        assert_eq!(*log.lock(), vec!["tick"]);
    }

    #[test]
    fn test_handler_can_deactivate_later_handler() {
        let bus = Arc::new(LocalBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let kind = EventKind::of::<Tick>();
        let victim: Arc<Mutex<Option<BusToken>>> = Arc::new(Mutex::new(None));

        let first: BusHandler = {
            let bus = Arc::clone(&bus);
            let victim = Arc::clone(&victim);
            let log = Arc::clone(&log);
            Arc::new(move |_event: &dyn Event| {
                log.lock().push("first");
                if let Some(token) = victim.lock().take() {
                    bus.deactivate(token);
                }
            })
        };
        bus.register(kind, Priority::Low, first).unwrap();
        let second = bus.register(kind, Priority::High, recorder(&log, "second")).unwrap();
        *victim.lock() = Some(second);

        assert_eq!(bus.publish(&Tick), 1);
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn test_shutdown_rejects_registration() {
        let bus = LocalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.register(EventKind::of::<Tick>(), Priority::Normal, recorder(&log, "a"))
            .unwrap();

        bus.shutdown();
        assert!(bus.is_shut_down());
        assert_eq!(bus.route_count(), 0);
        assert_eq!(bus.publish(&Tick), 0);

        let result = bus.register(EventKind::of::<Tick>(), Priority::Normal, recorder(&log, "b"));
        assert!(matches!(result, Err(SubscriptionError::BusClosed)));
    }
}
