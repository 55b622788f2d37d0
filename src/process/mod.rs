//! Process tracking: per-bot records and the output multiplexer.

pub(crate) mod child;
mod record;

pub use record::{BotId, ProcessRecord, ProcessSnapshot, ProcessState};
