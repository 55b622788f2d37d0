//! # Process records: per-bot supervision state.
//!
//! A [`ProcessRecord`] is the supervisor's tracked state for one bot's
//! current (or most recent) run, keyed by [`BotId`]. All transitions happen
//! under the registry's per-identity lock; this module only defines the
//! state machine, it never takes locks itself.
//!
//! ## State machine
//! ```text
//! Stopped → Starting → Running → Stopping → Exited
//!               │          └────────────────► Exited   (crash, no Stopping)
//!               └─────────────────────────────► Exited  (spawn failure)
//! ```
//!
//! `Exited` is terminal for one run; the next `start` resets the same record
//! back to `Starting` with a bumped run generation.
//!
//! ## Rules
//! - At most one record per identity is in a non-terminal state at any time
//!   (the duplicate-start guard lives in the registry).
//! - `pid` and the kill token are present only in `Starting`/`Running`/`Stopping`.
//! - `exit` is set only on the transition into `Exited`.
//! - The `generation` counter makes the exit callback of a superseded run a
//!   no-op: a stale waiter can never clobber a record a new `start` reused.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::events::ExitReason;

/// Immutable identity of a bot: the owning user and the artifact path.
///
/// The path is an opaque handle to the executable artifact on durable
/// storage, unique per owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BotId {
    owner: Arc<str>,
    path: Arc<str>,
}

impl BotId {
    /// Creates a new identity.
    pub fn new(owner: impl Into<Arc<str>>, path: impl Into<Arc<str>>) -> Self {
        Self {
            owner: owner.into(),
            path: path.into(),
        }
    }

    /// The verified owner identity string.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The artifact path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Owner as a shared string (cheap clone for event tagging).
    pub fn owner_arc(&self) -> Arc<str> {
        Arc::clone(&self.owner)
    }

    /// Path as a shared string (cheap clone for event tagging).
    pub fn path_arc(&self) -> Arc<str> {
        Arc::clone(&self.path)
    }
}

impl std::fmt::Display for BotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.owner, self.path)
    }
}

/// Lifecycle state of one tracked bot process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Never started, or reset after a completed cycle.
    Stopped,
    /// `start` accepted; the OS process is being spawned.
    Starting,
    /// The OS process is alive and its output is being multiplexed.
    Running,
    /// A termination request was sent; waiting for the exit callback.
    Stopping,
    /// The run ended. Terminal for this instance.
    Exited,
}

impl ProcessState {
    /// True for `Starting`/`Running`/`Stopping` — the states the
    /// duplicate-start guard refuses to start over.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }

    /// Short stable label (snake_case) for logs and API payloads.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessState::Stopped => "stopped",
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Exited => "exited",
        }
    }
}

/// Mutable supervision state for one bot.
///
/// Owned by the registry behind a per-identity mutex; reused across
/// stop/start cycles rather than reallocated.
#[derive(Debug)]
pub struct ProcessRecord {
    id: BotId,
    state: ProcessState,
    pid: Option<u32>,
    exit: Option<ExitReason>,
    kill_token: Option<CancellationToken>,
    generation: u64,
}

impl ProcessRecord {
    /// Creates a fresh record in `Stopped`.
    pub fn new(id: BotId) -> Self {
        Self {
            id,
            state: ProcessState::Stopped,
            pid: None,
            exit: None,
            kill_token: None,
            generation: 0,
        }
    }

    /// The identity this record tracks.
    pub fn id(&self) -> &BotId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS pid, present only while the process is alive.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kill token of the current run, if any.
    pub fn kill_token(&self) -> Option<&CancellationToken> {
        self.kill_token.as_ref()
    }

    /// Begins a new run cycle: resets the record to `Starting` and returns
    /// the new run generation.
    ///
    /// Caller must have verified the record is not active.
    pub fn begin_start(&mut self) -> u64 {
        debug_assert!(!self.state.is_active());
        self.generation += 1;
        self.state = ProcessState::Starting;
        self.pid = None;
        self.exit = None;
        self.kill_token = None;
        self.generation
    }

    /// Spawn succeeded: record the pid and kill token, enter `Running`.
    pub fn mark_running(&mut self, pid: Option<u32>, kill_token: CancellationToken) {
        self.state = ProcessState::Running;
        self.pid = pid;
        self.kill_token = Some(kill_token);
    }

    /// Spawn failed: enter `Exited` with no exit reason.
    pub fn mark_spawn_failed(&mut self) {
        self.state = ProcessState::Exited;
        self.pid = None;
        self.kill_token = None;
    }

    /// Termination was requested: enter `Stopping`.
    pub fn mark_stopping(&mut self) {
        self.state = ProcessState::Stopping;
    }

    /// Exit callback for run `generation`: enter `Exited` with the reason.
    ///
    /// Returns `false` (and changes nothing) if the record was already
    /// reused by a newer run — the stale-callback guard.
    pub fn mark_exited(&mut self, generation: u64, reason: ExitReason) -> bool {
        if generation != self.generation || !self.state.is_active() {
            return false;
        }
        self.state = ProcessState::Exited;
        self.exit = Some(reason);
        self.pid = None;
        self.kill_token = None;
        true
    }

    /// Read-only snapshot for `status` queries.
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            state: self.state,
            pid: self.pid,
            exit: self.exit,
        }
    }
}

/// Point-in-time view of a record; never blocks on the process itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessSnapshot {
    /// Lifecycle state at snapshot time.
    pub state: ProcessState,
    /// OS pid, if the process was alive.
    pub pid: Option<u32>,
    /// Exit reason of the most recent run, if it ended.
    pub exit: Option<ExitReason>,
}

impl ProcessSnapshot {
    /// Snapshot for an identity that was never started.
    pub fn stopped() -> Self {
        Self {
            state: ProcessState::Stopped,
            pid: None,
            exit: None,
        }
    }
}
