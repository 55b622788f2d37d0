//! Event model: kinds, payloads, and the broadcast bus.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{BotEvent, EventKind, ExitReason};
