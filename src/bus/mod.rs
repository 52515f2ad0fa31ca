//! Bus adapter contract and an in-process implementation.
//!
//! The engine never owns the event bus. It needs two operations from it,
//! described by [`BusAdapter`]. [`LocalBus`] implements them in memory for
//! hosts that have no bus of their own and for tests.

mod adapter;
mod local;

pub use adapter::{BusAdapter, BusHandler};
pub use local::LocalBus;
