//! The event trait understood by the engine and bus adapters.

use crate::types::EventKind;
use std::any::Any;

/// Runtime identity of an event value. Implemented for every `'static` type.
pub trait EventIdentity: Any {
    /// Exact kind of the concrete value.
    fn kind(&self) -> EventKind;

    /// Access for exact downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> EventIdentity for T {
    fn kind(&self) -> EventKind {
        EventKind::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An event that can travel over a bus.
///
/// `family` is the routing category the bus files the event under. It defaults
/// to the event's own kind; override it to have the event delivered to
/// handlers registered for a broader category:
///
/// ```
/// use bus_observers::{Event, EventKind};
///
/// struct PlayerEvent;
/// impl Event for PlayerEvent {}
///
/// struct PlayerJoin;
/// impl Event for PlayerJoin {
///     fn family(&self) -> EventKind {
///         EventKind::of::<PlayerEvent>()
///     }
/// }
/// ```
///
/// Call these methods on a `&dyn Event` or on the concrete value, never on a
/// `Box<dyn Event>`: the box itself is a `'static` type and would report its
/// own kind.
pub trait Event: EventIdentity {
    fn family(&self) -> EventKind {
        self.kind()
    }
}

/// Downcast a delivered event to `T` when its kind matches exactly.
pub fn downcast<T: Event>(event: &dyn Event) -> Option<&T> {
    if event.kind() != EventKind::of::<T>() {
        return None;
    }
    event.as_any().downcast_ref::<T>()
}
