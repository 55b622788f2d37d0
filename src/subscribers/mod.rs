//! Event delivery: the sink trait and the per-owner broadcaster.

mod broadcaster;
mod subscribe;

pub use broadcaster::{Broadcaster, SubscriberId};
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
