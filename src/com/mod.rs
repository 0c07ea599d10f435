//! Signal/slot communication bus.
//!
//! - [`Worker`]: named thread running posted closures in FIFO order
//! - [`Slot`]: callable, optionally bound to a worker
//! - [`Signal`]: typed event delivered to connected slots
//! - [`Signals`] / [`Slots`]: string-keyed holders used for connections by name

mod holders;
mod signal;
mod slot;
mod worker;

pub use holders::{connect_by_name, Signals, Slots};
pub use signal::{Blocker, Connection, Connections, Signal};
pub use slot::Slot;
pub use worker::{TaskHandle, Worker};
