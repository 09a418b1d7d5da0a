//! Synchronous publish/subscribe with bounded history.

pub mod bus;
pub mod names;

pub use bus::{BusStatus, EmittedEvent, EventBus};
