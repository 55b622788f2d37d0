//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervision runtime.
//!
//! ## Sentinel values
//! - `grace = 0s` → no grace window: `stop` escalates to SIGKILL immediately
//!   (the behavior of an unconditional kill).

use std::time::Duration;

/// Global configuration for the supervision runtime.
///
/// ## Field semantics
/// - `grace`: wait between the termination signal and the forced kill, and
///   the shutdown wait for all bots to exit (`0s` = kill immediately)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`)
/// - `read_chunk_size`: bytes per read on each process output stream
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait after SIGTERM before escalating to SIGKILL.
    ///
    /// Also bounds `Supervisor::shutdown`: bots still alive after `grace`
    /// are reported via `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Read buffer size for each process output stream, in bytes.
    ///
    /// Chunk boundaries follow whatever the pipe delivers; this only caps a
    /// single chunk. Minimum value is 64 (clamped).
    pub read_chunk_size: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a read chunk size clamped to a minimum of 64 bytes.
    #[inline]
    pub fn read_chunk_size_clamped(&self) -> usize {
        self.read_chunk_size.max(64)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s` (bounded window for bots to handle SIGTERM)
    /// - `bus_capacity = 1024`
    /// - `read_chunk_size = 8192`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            read_chunk_size: 8192,
        }
    }
}
