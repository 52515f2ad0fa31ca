//! End-to-end subscription lifecycle tests against the local bus.

use bus_observers::{
    Clock, Event, EventKind, LocalBus, ManualClock, Observers, Priority, SubscriptionStats,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Ping;
impl Event for Ping {}

struct Msg(String);
impl Event for Msg {}

impl Msg {
    fn new(text: &str) -> Self {
        Msg(text.to_string())
    }
}

struct Tick;
impl Event for Tick {}

/// Broad category filed on the same handler list as its members.
struct PlayerEvent;
impl Event for PlayerEvent {}

struct PlayerJoin;
impl Event for PlayerJoin {
    fn family(&self) -> EventKind {
        EventKind::of::<PlayerEvent>()
    }
}

fn setup() -> (Arc<LocalBus>, Observers) {
    let bus = Arc::new(LocalBus::new());
    let observers = Observers::new(Arc::clone(&bus));
    (bus, observers)
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&count), count)
}

// --- Once ---

#[test]
fn test_once_fires_a_single_time() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    observers
        .observe(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.publish(&Ping);
    bus.publish(&Ping);

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_once_ignores_other_kinds_until_its_own() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    let handle = observers
        .observe(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.publish(&Tick);
    assert!(handle.is_active());

    bus.publish(&Ping);
    assert!(!handle.is_active());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_once_does_not_rerun_on_reentrant_publish() {
    let (bus, observers) = setup();
    let (count, inner) = counter();
    let republish = Arc::clone(&bus);

    observers
        .observe(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
            republish.publish(&Ping);
        })
        .unwrap();

    bus.publish(&Ping);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// --- Persistent ---

#[test]
fn test_persistent_fires_every_time() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    let handle = observers
        .observe_all(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.publish(&Ping);
    bus.publish(&Ping);
    assert_eq!(count.load(Ordering::SeqCst), 2);

    handle.cancel();
    bus.publish(&Ping);
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(bus.route_count(), 0);
}

#[test]
fn test_persistent_removed_by_bus_teardown() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    observers
        .observe_all(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.publish(&Ping);
    bus.shutdown();
    bus.publish(&Ping);

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// --- Filtered ---

#[test]
fn test_filtered_fires_on_matching_text_only() {
    let (bus, observers) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let handle = observers
        .observe_if(
            move |msg: &Msg| sink.lock().push(msg.0.clone()),
            |msg: &Msg| msg.0.starts_with('H'),
        )
        .unwrap();

    bus.publish(&Msg::new("Hello"));
    bus.publish(&Msg::new("Bye"));

    assert_eq!(*seen.lock(), vec!["Hello".to_string()]);
    assert!(handle.is_active());
    assert_eq!(
        handle.stats(),
        SubscriptionStats {
            invoked: 1,
            failed: 0,
            declined: 1,
            ignored: 0,
        }
    );
}

// --- Time-bounded ---

#[test]
fn test_time_bounded_with_manual_clock() {
    let bus = Arc::new(LocalBus::new());
    let clock = Arc::new(ManualClock::new());
    let observers =
        Observers::new(Arc::clone(&bus)).with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    let remaining = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&remaining);

    let handle = observers
        .observe_for_timed(
            move |_: &Tick, left: Duration| seen.lock().push(left),
            Duration::from_secs(3),
        )
        .unwrap();

    bus.publish(&Tick);
    clock.advance(Duration::from_secs(1));
    bus.publish(&Tick);
    clock.advance(Duration::from_secs(3));
    bus.publish(&Tick);
    bus.publish(&Tick);

    assert_eq!(
        *remaining.lock(),
        vec![Duration::from_secs(3), Duration::from_secs(2)]
    );
    assert!(!handle.is_active());
    assert_eq!(handle.stats().invoked, 2);
}

#[test]
fn test_time_bounded_with_real_clock() {
    let (bus, observers) = setup();
    let (count, inner) = counter();
    let remaining = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&remaining);

    observers
        .observe_for_timed(
            move |_: &Tick, left: Duration| {
                inner.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = Some(left);
            },
            Duration::from_millis(300),
        )
        .unwrap();

    bus.publish(&Tick);
    std::thread::sleep(Duration::from_millis(400));
    bus.publish(&Tick);

    assert_eq!(count.load(Ordering::SeqCst), 1);
    let left: Option<Duration> = *remaining.lock();
    let left = left.unwrap();
    assert!(left <= Duration::from_millis(300));
    assert!(left > Duration::from_millis(200));
    assert_eq!(bus.route_count(), 0);
}

#[test]
fn test_time_bounded_without_remaining_argument() {
    let bus = Arc::new(LocalBus::new());
    let clock = Arc::new(ManualClock::new());
    let observers =
        Observers::new(Arc::clone(&bus)).with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    let (count, inner) = counter();

    observers
        .observe_for_with_priority(
            Priority::High,
            move |_: &Tick| {
                inner.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_secs(3),
        )
        .unwrap();

    bus.publish(&Tick);
    clock.advance(Duration::from_secs(3));
    bus.publish(&Tick);
    clock.advance(Duration::from_secs(1));
    bus.publish(&Tick);

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

// --- Type exactness ---

#[test]
fn test_category_subscription_never_sees_members() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    let handle = observers
        .observe_all(move |_: &PlayerEvent| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(bus.publish(&PlayerJoin), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(handle.stats().ignored, 1);

    bus.publish(&PlayerEvent);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_member_subscription_is_not_routed_category_events() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    observers
        .observe_all(move |_: &PlayerJoin| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    bus.publish(&PlayerJoin);
    bus.publish(&PlayerEvent);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

// --- Ordering and handles ---

#[test]
fn test_priorities_order_handlers() {
    let (bus, observers) = setup();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (priority, name) in [
        (Priority::Monitor, "monitor"),
        (Priority::Lowest, "lowest"),
        (Priority::Normal, "normal"),
    ] {
        let order = Arc::clone(&order);
        observers
            .observe_all_with_priority(priority, move |_: &Ping| order.lock().push(name))
            .unwrap();
    }

    bus.publish(&Ping);
    assert_eq!(*order.lock(), vec!["lowest", "normal", "monitor"]);
}

#[test]
fn test_cancel_twice_matches_cancel_once() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    let first = observers
        .observe_all(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let (other, other_inner) = counter();
    observers
        .observe_all(move |_: &Ping| {
            other_inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    first.cancel();
    first.cancel();
    bus.publish(&Ping);

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(other.load(Ordering::SeqCst), 1);
    assert_eq!(bus.route_count(), 1);
}

#[test]
fn test_handler_can_cancel_another_subscription_mid_dispatch() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    let victim = observers
        .observe_all_with_priority(Priority::High, move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let to_cancel = victim.clone();
    observers
        .observe_with_priority(Priority::Low, move |_: &Ping| to_cancel.cancel())
        .unwrap();

    bus.publish(&Ping);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(!victim.is_active());
}

#[test]
fn test_dropping_handle_keeps_subscription() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    drop(
        observers
            .observe_all(move |_: &Ping| {
                inner.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap(),
    );

    bus.publish(&Ping);
    bus.publish(&Ping);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_delivery_from_several_threads_runs_once_subscription_once() {
    let (bus, observers) = setup();
    let (count, inner) = counter();

    observers
        .observe(move |_: &Ping| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    bus.publish(&Ping);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(count.load(Ordering::SeqCst), 1);
}
