//! Subscription lifecycle on top of a host bus.
//!
//! This module provides four lifecycle policies for observers:
//! - Once: handle one event, then stop
//! - Persistent: handle every event until cancelled
//! - Filtered: handle events that pass a predicate
//! - TimeBounded: handle events until a deadline passes
//!
//! Every delivery goes through the same steps. The exact event kind is
//! checked first, since a bus may deliver a whole family to one handler list.
//! An inactive subscription then does nothing. Otherwise the policy decides
//! whether to run the callback (through the sanitizer) and whether to
//! deactivate.
//!
//! # Example
//!
//! ```ignore
//! let bus = Arc::new(LocalBus::new());
//! let observers = Observers::new(Arc::clone(&bus));
//!
//! // Greet the first player only
//! observers.observe(|join: &PlayerJoin| println!("first: {}", join.name))?;
//!
//! // Count chat lines starting with "!"
//! let commands = observers.observe_if(
//!     |chat: &Chat| run_command(&chat.text),
//!     |chat: &Chat| chat.text.starts_with('!'),
//! )?;
//!
//! // Fallible callbacks use the `try_` variants; an `Err` is reported
//! observers.try_observe_all(|save: &WorldSave| std::fs::write(&save.path, &save.data))?;
//!
//! bus.publish(&PlayerJoin { name: "alex".into() });
//! commands.cancel();
//! ```
//!
//! # Threading
//!
//! The engine starts no threads and never blocks. Activation is an atomic
//! flag and policy state is fixed at registration, so a one-shot subscription
//! runs at most once even if the host bus delivers on several threads. Any
//! further ordering between threads is up to the bus.

mod handle;
mod policy;
mod registrar;

pub use handle::{DeactivationReason, SubscriptionHandle, SubscriptionStats};
pub use policy::DispatchPolicy;
pub use registrar::Observers;
