//! Core runtime: registry, supervisor façade, builder, shutdown signal.

mod builder;
mod registry;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use registry::Registry;
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::Supervisor;
