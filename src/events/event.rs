//! # Runtime events emitted by the supervisor and process multiplexers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Console events**: live process output (`Output`, `ErrorOutput`) and
//!   the terminal `Closed` notification — these are owner-scoped and are the
//!   only kinds routed to per-owner subscribers.
//! - **Lifecycle events**: process management flow (`Started`).
//! - **Runtime events**: supervisor shutdown and subscriber health.
//!
//! The [`BotEvent`] struct carries the metadata for a kind: owner identity,
//! bot path, output chunk, exit reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Within one stream of one process, chunk events are
//! published in read order; no ordering is guaranteed between the stdout and
//! stderr streams of the same process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Console events (owner-scoped) ===
    /// A chunk of the process's stdout stream.
    ///
    /// Sets: `owner`, `bot`, `chunk`.
    Output,

    /// A chunk of the process's stderr stream.
    ///
    /// Sets: `owner`, `bot`, `chunk`.
    ErrorOutput,

    /// The process terminated; published exactly once per successful start,
    /// whether the run ended by natural exit, crash, or `stop`.
    ///
    /// Sets: `owner`, `bot`, `exit`.
    Closed,

    // === Lifecycle events ===
    /// A process entered `Running` after a successful spawn.
    ///
    /// Sets: `owner`, `bot`.
    Started,

    // === Runtime events ===
    /// A subscriber sink dropped an event (queue full or worker closed).
    ///
    /// Sets: `bot` (sink name), `reason`.
    SubscriberOverflow,

    /// A subscriber sink panicked while processing an event.
    ///
    /// Sets: `bot` (sink name), `reason` (panic info).
    SubscriberPanicked,

    /// Supervisor shutdown requested.
    ShutdownRequested,

    /// All processes exited within the shutdown grace period.
    AllStoppedWithin,

    /// Shutdown grace period exceeded; some processes had to be force-killed.
    GraceExceeded,
}

/// How a process run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Normal termination with an exit code.
    Code(i32),
    /// Abnormal termination: killed by the given signal.
    Signal(i32),
}

impl ExitReason {
    /// Returns true for a clean `exit 0`.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitReason::Code(0))
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Code(c) => write!(f, "{c}"),
            ExitReason::Signal(s) => write!(f, "signal:{s}"),
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct BotEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Owner identity the event is scoped to.
    pub owner: Option<Arc<str>>,
    /// Bot path (or sink name for subscriber health events).
    pub bot: Option<Arc<str>>,
    /// Output chunk (lossy UTF-8) for `Output`/`ErrorOutput`.
    pub chunk: Option<Arc<str>>,
    /// Exit reason, set only on `Closed`.
    pub exit: Option<ExitReason>,
    /// Human-readable detail (overflow reasons, panic info).
    pub reason: Option<Arc<str>>,
}

impl BotEvent {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            owner: None,
            bot: None,
            chunk: None,
            exit: None,
            reason: None,
        }
    }

    /// Attaches the owner identity.
    #[inline]
    pub fn with_owner(mut self, owner: impl Into<Arc<str>>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Attaches the bot path.
    #[inline]
    pub fn with_bot(mut self, bot: impl Into<Arc<str>>) -> Self {
        self.bot = Some(bot.into());
        self
    }

    /// Attaches an output chunk.
    #[inline]
    pub fn with_chunk(mut self, chunk: impl Into<Arc<str>>) -> Self {
        self.chunk = Some(chunk.into());
        self
    }

    /// Attaches an exit reason.
    #[inline]
    pub fn with_exit(mut self, exit: ExitReason) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Attaches a human-readable detail string.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for owner-scoped console events (`Output`/`ErrorOutput`/`Closed`)
    /// that the broadcaster fans out to the owner's subscribers.
    #[inline]
    pub fn is_console(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Output | EventKind::ErrorOutput | EventKind::Closed
        )
    }

    /// Creates a sink overflow event.
    #[inline]
    pub fn subscriber_overflow(sink: &'static str, reason: &'static str) -> Self {
        BotEvent::now(EventKind::SubscriberOverflow)
            .with_bot(sink)
            .with_reason(format!("sink={sink} reason={reason}"))
    }

    /// Creates a sink panic event.
    #[inline]
    pub fn subscriber_panicked(sink: &'static str, info: String) -> Self {
        BotEvent::now(EventKind::SubscriberPanicked)
            .with_bot(sink)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = BotEvent::now(EventKind::Started);
        let b = BotEvent::now(EventKind::Started);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = BotEvent::now(EventKind::Closed)
            .with_owner("alice")
            .with_bot("/bots/alice/ping.sh")
            .with_exit(ExitReason::Code(0));
        assert_eq!(ev.owner.as_deref(), Some("alice"));
        assert_eq!(ev.bot.as_deref(), Some("/bots/alice/ping.sh"));
        assert_eq!(ev.exit, Some(ExitReason::Code(0)));
        assert!(ev.is_console());
    }

    #[test]
    fn exit_reason_formatting() {
        assert_eq!(ExitReason::Code(3).to_string(), "3");
        assert_eq!(ExitReason::Signal(9).to_string(), "signal:9");
        assert!(ExitReason::Code(0).is_success());
        assert!(!ExitReason::Signal(15).is_success());
    }

    #[test]
    fn runtime_events_are_not_console() {
        assert!(!BotEvent::now(EventKind::Started).is_console());
        assert!(!BotEvent::now(EventKind::ShutdownRequested).is_console());
    }
}
