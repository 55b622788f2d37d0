//! # Process registry - the single serialization point for start/stop.
//!
//! The registry is the sole authority over [`ProcessRecord`] transitions. It
//! owns the identity → record map and serializes every check-then-transition
//! against concurrent callers, which is what prevents two racing `start`
//! calls from both observing `Stopped` and both spawning a process.
//!
//! ## Architecture
//! ```text
//! start(id) ──► per-identity lock ──► begin_start ──► spawn OS process
//!                                         │                 │ ok
//!                                         │ spawn err       ▼
//!                                         ▼            mark_running ──► Started event
//!                                    mark_spawn_failed      │
//!                                    (Exited, SpawnFailed)  └─► supervise_child (async)
//!                                                                   │ exit
//! stop(id) ───► per-identity lock ──► mark_stopping ──► SIGTERM     ▼
//!                  │                     └─ grace timer → kill   finish(id, generation)
//!                  └─ Stopping: Ok, no second signal                │
//!                                                       per-identity lock → mark_exited
//!                                                             └─► Closed event (once)
//! ```
//!
//! ## Rules
//! - The outer map lock is held only to look up or insert a slot; all state
//!   decisions happen under the slot's own mutex.
//! - Reader tasks never take any registry lock; only the exit callback
//!   (`finish`) takes the slot lock, briefly, for the terminal transition.
//! - Records are reused across stop/start cycles; an `Exited` record is
//!   lazily overwritten by the next `start`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{StartError, StopError};
use crate::events::{BotEvent, Bus, EventKind, ExitReason};
use crate::process::child;
use crate::process::{BotId, ProcessRecord, ProcessSnapshot, ProcessState};

/// Identity → record map with per-identity exclusive sections.
pub struct Registry {
    bots: RwLock<HashMap<BotId, Arc<Mutex<ProcessRecord>>>>,
    bus: Bus,
    cfg: Config,
}

impl Registry {
    /// Creates a new registry publishing lifecycle events to `bus`.
    pub fn new(bus: Bus, cfg: Config) -> Arc<Self> {
        Arc::new(Self {
            bots: RwLock::new(HashMap::new()),
            bus,
            cfg,
        })
    }

    /// Starts the bot process for `id`.
    ///
    /// Fails with [`StartError::AlreadyRunning`] if a record for the
    /// identity is in `Starting`/`Running`/`Stopping` — nothing is spawned.
    /// A spawn failure moves the record to `Exited` with no exit reason and
    /// returns [`StartError::SpawnFailed`]; no `Closed` event is published
    /// for a run that never began.
    pub async fn start(self: &Arc<Self>, id: BotId) -> Result<(), StartError> {
        let slot = self.slot(&id).await;
        let mut record = slot.lock().await;

        if record.state().is_active() {
            return Err(StartError::AlreadyRunning);
        }

        let generation = record.begin_start();
        let mut child = match child::spawn_bot(id.path()) {
            Ok(child) => child,
            Err(source) => {
                record.mark_spawn_failed();
                return Err(StartError::SpawnFailed { source });
            }
        };

        let pid = child.id();
        let kill_token = CancellationToken::new();
        record.mark_running(pid, kill_token.clone());
        drop(record);

        self.bus.publish(
            BotEvent::now(EventKind::Started)
                .with_owner(id.owner_arc())
                .with_bot(id.path_arc()),
        );

        let me = Arc::clone(self);
        let bus = self.bus.clone();
        let chunk_size = self.cfg.read_chunk_size_clamped();
        let run_id = id.clone();
        tokio::spawn(async move {
            let reason =
                child::supervise_child(child, run_id.clone(), bus, kill_token, chunk_size).await;
            me.finish(&run_id, generation, reason).await;
        });

        Ok(())
    }

    /// Requests termination of the bot process for `id`.
    ///
    /// Transitions to `Stopping`, sends SIGTERM, schedules the forced-kill
    /// escalation after the configured grace period, and returns
    /// immediately — the exit confirmation arrives via the `Closed` event.
    ///
    /// A second `stop` while already `Stopping` is an accepted no-op (one
    /// termination path, one exit event). `Stopped`/`Exited`/unknown
    /// identities fail with [`StopError::NotRunning`].
    pub async fn stop(&self, id: &BotId) -> Result<(), StopError> {
        let Some(slot) = self.existing_slot(id).await else {
            return Err(StopError::NotRunning);
        };
        let mut record = slot.lock().await;

        match record.state() {
            ProcessState::Running | ProcessState::Starting => {
                record.mark_stopping();
                let pid = record.pid();
                let kill_token = record.kill_token().cloned();
                drop(record);
                self.request_stop(id, pid, kill_token);
                Ok(())
            }
            ProcessState::Stopping => Ok(()),
            ProcessState::Stopped | ProcessState::Exited => Err(StopError::NotRunning),
        }
    }

    /// Read-only snapshot; never blocks on the process itself.
    ///
    /// An identity that was never started reads as `Stopped`.
    pub async fn status(&self, id: &BotId) -> ProcessSnapshot {
        match self.existing_slot(id).await {
            Some(slot) => slot.lock().await.snapshot(),
            None => ProcessSnapshot::stopped(),
        }
    }

    /// Identities whose record is currently in a non-terminal state.
    pub async fn active(&self) -> Vec<BotId> {
        let bots = self.bots.read().await;
        let mut out = Vec::new();
        for (id, slot) in bots.iter() {
            if slot.lock().await.state().is_active() {
                out.push(id.clone());
            }
        }
        out
    }

    /// Exit callback: terminal transition plus the single `Closed` event.
    ///
    /// Invoked exactly once per run by the multiplexer's waiter; the
    /// generation check makes a stale callback for a superseded run a no-op.
    async fn finish(&self, id: &BotId, generation: u64, reason: ExitReason) {
        let Some(slot) = self.existing_slot(id).await else {
            return;
        };
        let mut record = slot.lock().await;
        if record.mark_exited(generation, reason) {
            drop(record);
            self.bus.publish(
                BotEvent::now(EventKind::Closed)
                    .with_owner(id.owner_arc())
                    .with_bot(id.path_arc())
                    .with_exit(reason),
            );
        } else {
            tracing::debug!(bot = %id, "stale exit callback ignored");
        }
    }

    /// Issues SIGTERM and arms the grace timer that escalates to SIGKILL.
    ///
    /// Runs outside the slot lock; `stop` has already committed `Stopping`.
    fn request_stop(&self, id: &BotId, pid: Option<u32>, kill_token: Option<CancellationToken>) {
        let Some(kill_token) = kill_token else {
            // Starting record without a spawned process; nothing to signal.
            return;
        };

        let delivered = match pid {
            Some(pid) => child::request_termination(pid),
            None => false,
        };

        if !delivered || self.cfg.grace.is_zero() {
            // No graceful path (signal undeliverable or zero grace):
            // escalate now. The waiter performs the actual kill.
            kill_token.cancel();
            return;
        }

        tracing::debug!(bot = %id, grace = ?self.cfg.grace, "termination requested");
        let grace = self.cfg.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            // Harmless if the process already exited.
            kill_token.cancel();
        });
    }

    /// Returns the slot for `id`, inserting a fresh `Stopped` record if the
    /// identity was never seen.
    async fn slot(&self, id: &BotId) -> Arc<Mutex<ProcessRecord>> {
        {
            let bots = self.bots.read().await;
            if let Some(slot) = bots.get(id) {
                return Arc::clone(slot);
            }
        }
        let mut bots = self.bots.write().await;
        Arc::clone(
            bots.entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(ProcessRecord::new(id.clone())))),
        )
    }

    async fn existing_slot(&self, id: &BotId) -> Option<Arc<Mutex<ProcessRecord>>> {
        let bots = self.bots.read().await;
        bots.get(id).map(Arc::clone)
    }
}
