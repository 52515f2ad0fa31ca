//! Dispatch policies deciding, per delivery, whether to run and whether to stop.

use crate::clock::Clock;
use crate::event::Event;
use crate::sanitizer::{CallbackError, Sanitizer};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::handle::{DeactivationReason, SubscriptionState};

type Callback<T> = Arc<dyn Fn(&T) -> Result<(), CallbackError> + Send + Sync>;
type TimedCallback<T> = Arc<dyn Fn(&T, Duration) -> Result<(), CallbackError> + Send + Sync>;
type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Lifecycle policy of a subscription.
///
/// | Policy | On delivery | Deactivates |
/// |---|---|---|
/// | `Once` | invoke | after the first delivery, even if the callback failed |
/// | `Persistent` | invoke | never |
/// | `Filtered` | invoke if the predicate holds | never |
/// | `TimeBounded` | invoke with the time left, unless past the deadline | on the first delivery past the deadline, without invoking |
pub enum DispatchPolicy<T> {
    Once(Callback<T>),
    Persistent(Callback<T>),
    Filtered {
        predicate: Predicate<T>,
        callback: Callback<T>,
    },
    TimeBounded {
        deadline: Instant,
        callback: TimedCallback<T>,
    },
}

fn wrap<T, F>(callback: F) -> Callback<T>
where
    T: 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |event: &T| {
        callback(event);
        Ok(())
    })
}

fn wrap_fallible<T, F, E>(callback: F) -> Callback<T>
where
    T: 'static,
    F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    E: Into<CallbackError>,
{
    Arc::new(move |event: &T| callback(event).map_err(Into::<CallbackError>::into))
}

impl<T: Event> DispatchPolicy<T> {
    /// Create a policy that runs `callback` on the first delivery only.
    pub fn once<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        DispatchPolicy::Once(wrap(callback))
    }

    /// Like [`once`](Self::once), for a callback that can return an error.
    pub fn try_once<F, E>(callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        DispatchPolicy::Once(wrap_fallible(callback))
    }

    /// Create a policy that runs `callback` on every delivery until cancelled.
    pub fn persistent<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        DispatchPolicy::Persistent(wrap(callback))
    }

    /// Like [`persistent`](Self::persistent), for a callback that can return an error.
    pub fn try_persistent<F, E>(callback: F) -> Self
    where
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        DispatchPolicy::Persistent(wrap_fallible(callback))
    }

    /// Create a policy that runs `callback` only for events matching
    /// `predicate`.
    pub fn filtered<F, P>(callback: F, predicate: P) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        DispatchPolicy::Filtered {
            predicate: Arc::new(predicate),
            callback: wrap(callback),
        }
    }

    /// Like [`filtered`](Self::filtered), for a callback that can return an error.
    pub fn try_filtered<F, E, P>(callback: F, predicate: P) -> Self
    where
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        DispatchPolicy::Filtered {
            predicate: Arc::new(predicate),
            callback: wrap_fallible(callback),
        }
    }

    /// Runs until the first delivery after `deadline`. The callback receives
    /// the time left until the deadline.
    pub fn time_bounded<F>(deadline: Instant, callback: F) -> Self
    where
        F: Fn(&T, Duration) + Send + Sync + 'static,
    {
        DispatchPolicy::TimeBounded {
            deadline,
            callback: Arc::new(move |event: &T, remaining: Duration| {
                callback(event, remaining);
                Ok(())
            }),
        }
    }

    /// Like [`time_bounded`](Self::time_bounded), for a callback that can return
    /// an error.
    pub fn try_time_bounded<F, E>(deadline: Instant, callback: F) -> Self
    where
        F: Fn(&T, Duration) -> Result<(), E> + Send + Sync + 'static,
        E: Into<CallbackError>,
    {
        DispatchPolicy::TimeBounded {
            deadline,
            callback: Arc::new(move |event: &T, remaining: Duration| {
                callback(event, remaining).map_err(Into::<CallbackError>::into)
            }),
        }
    }

    /// Short policy name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DispatchPolicy::Once(_) => "once",
            DispatchPolicy::Persistent(_) => "persistent",
            DispatchPolicy::Filtered { .. } => "filtered",
            DispatchPolicy::TimeBounded { .. } => "time_bounded",
        }
    }

    /// Deadline of a `TimeBounded` policy.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            DispatchPolicy::TimeBounded { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// Handle one delivery of an exactly matching event to an active
    /// subscription.
    pub(crate) fn dispatch(
        &self,
        event: &T,
        state: &SubscriptionState,
        sanitizer: &Sanitizer,
        clock: &dyn Clock,
    ) {
        let kind = state.kind();

        match self {
            DispatchPolicy::Once(callback) => {
                // Claim first so re-entrant or concurrent deliveries cannot run
                // it a second time.
                if !state.deactivate(DeactivationReason::Handled) {
                    return;
                }
                state.record_invocation(sanitizer.try_invoke(kind, |e: &T| callback(e), event));
            }
            DispatchPolicy::Persistent(callback) => {
                state.record_invocation(sanitizer.try_invoke(kind, |e: &T| callback(e), event));
            }
            DispatchPolicy::Filtered {
                predicate,
                callback,
            } => match sanitizer.evaluate(kind, |e: &T| predicate(e), event) {
                Some(true) => {
                    state.record_invocation(sanitizer.try_invoke(kind, |e: &T| callback(e), event));
                }
                _ => state.record_declined(),
            },
            DispatchPolicy::TimeBounded { deadline, callback } => {
                let now = clock.now();
                if now > *deadline {
                    state.deactivate(DeactivationReason::Expired);
                    return;
                }
                let remaining = *deadline - now;
                state.record_invocation(sanitizer.try_invoke(
                    kind,
                    |e: &T| callback(e, remaining),
                    event,
                ));
            }
        }
    }
}

impl<T> fmt::Debug for DispatchPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPolicy::Once(_) => f.write_str("Once"),
            DispatchPolicy::Persistent(_) => f.write_str("Persistent"),
            DispatchPolicy::Filtered { .. } => f.write_str("Filtered"),
            DispatchPolicy::TimeBounded { deadline, .. } => {
                f.debug_struct("TimeBounded").field("deadline", deadline).finish()
            }
        }
    }
}
