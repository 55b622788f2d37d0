//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for plugging event sinks into
//! the runtime: websocket console sessions, loggers, metrics, tests.
//!
//! Each sink gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-sink bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `SubscriberPanicked`)
//!
//! ## Rules
//! - A slow sink only affects its own queue; it never delays delivery to
//!   another sink or blocks a publisher.
//! - Queue overflow drops the event **for this sink only** and publishes
//!   `EventKind::SubscriberOverflow`.
//! - Events are processed sequentially (FIFO) per sink.

use async_trait::async_trait;

use crate::events::BotEvent;

/// Event sink attached to the broadcaster.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this sink's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated worker task, not in the publisher context.
    /// Events are delivered in FIFO order per sink.
    async fn on_event(&self, event: &BotEvent);

    /// Returns the sink name used in logs and overflow/panic events.
    ///
    /// Prefer short, descriptive names (e.g., "console", "log").
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this sink.
    ///
    /// The runtime clamps capacity to a minimum of 1. Default: 256.
    fn queue_capacity(&self) -> usize {
        256
    }
}
