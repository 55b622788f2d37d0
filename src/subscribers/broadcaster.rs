//! # Per-owner event fan-out.
//!
//! Provides [`Broadcaster`] — delivers console events only to the sinks
//! registered under the event's owner, with non-blocking per-sink queues.
//!
//! ## Architecture
//! ```text
//! publish(owner, event)
//!     │ (owner's sinks only — strict isolation)
//!     ├──► [queue A] ──► worker A ──► sink_a.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     └──► [queue B] ──► worker B ──► sink_b.on_event()
//!          (bounded)
//!
//! emit_all(event)
//!     └──► every global sink (observability: loggers, metrics)
//! ```
//!
//! ## Rules
//! - **Isolation**: a sink registered under owner B never observes owner
//!   A's events; a slow or panicking sink affects only itself.
//! - **Non-blocking**: delivery uses `try_send`; on a full queue the event
//!   is dropped for that sink only and `SubscriberOverflow` is published.
//! - **No replay**: an owner with zero sinks at publish time drops the
//!   event; a sink attached later sees only subsequent events.
//! - **Panic handling**: worker tasks use `catch_unwind`; a panicking sink
//!   is reported via `SubscriberPanicked` and keeps processing.
//!
//! The sink maps use a plain `std::sync::RwLock`: every critical section is
//! a lookup or a vector edit with no await point, so publishers never park.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{BotEvent, Bus, EventKind};
use crate::subscribers::Subscribe;

/// Opaque handle identifying one registered sink (for `unsubscribe`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberId(u64);

/// Per-sink channel metadata.
struct SinkChannel {
    id: SubscriberId,
    name: &'static str,
    sender: mpsc::Sender<Arc<BotEvent>>,
    worker: JoinHandle<()>,
}

/// Fan-out coordinator: per-owner sink sets plus global observability sinks.
pub struct Broadcaster {
    owners: RwLock<HashMap<Arc<str>, Vec<SinkChannel>>>,
    globals: RwLock<Vec<SinkChannel>>,
    bus: Bus,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Creates an empty broadcaster.
    ///
    /// `bus` is used to report sink overflow/panic back into the runtime
    /// event stream.
    pub fn new(bus: Bus) -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
            globals: RwLock::new(Vec::new()),
            bus,
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a sink under an owner identity.
    ///
    /// The sink starts observing events published for that owner from this
    /// point forward; there is no replay of earlier events.
    ///
    /// Must be called from within a tokio runtime (spawns the sink worker).
    pub fn subscribe(&self, owner: &str, sink: Arc<dyn Subscribe>) -> SubscriberId {
        let channel = self.spawn_worker(sink);
        let id = channel.id;
        let mut owners = self.owners.write().expect("broadcaster lock poisoned");
        owners.entry(Arc::from(owner)).or_default().push(channel);
        id
    }

    /// Removes a sink registered under an owner.
    ///
    /// Dropping the channel sender closes the queue; the worker drains what
    /// it already accepted and exits. Unknown ids are ignored.
    pub fn unsubscribe(&self, owner: &str, id: SubscriberId) {
        let mut owners = self.owners.write().expect("broadcaster lock poisoned");
        if let Some(channels) = owners.get_mut(owner) {
            channels.retain(|c| c.id != id);
            if channels.is_empty() {
                owners.remove(owner);
            }
        }
    }

    /// Registers a global observability sink that receives every event
    /// regardless of owner (loggers, metrics — not subject to the per-owner
    /// isolation contract).
    pub fn subscribe_all(&self, sink: Arc<dyn Subscribe>) -> SubscriberId {
        let channel = self.spawn_worker(sink);
        let id = channel.id;
        self.globals
            .write()
            .expect("broadcaster lock poisoned")
            .push(channel);
        id
    }

    /// Removes a global sink.
    pub fn unsubscribe_all(&self, id: SubscriberId) {
        self.globals
            .write()
            .expect("broadcaster lock poisoned")
            .retain(|c| c.id != id);
    }

    /// Fans an event out to every sink currently registered for `owner`.
    ///
    /// Zero registered sinks ⇒ the event is dropped.
    pub fn publish(&self, owner: &str, event: Arc<BotEvent>) {
        let owners = self.owners.read().expect("broadcaster lock poisoned");
        if let Some(channels) = owners.get(owner) {
            for channel in channels {
                self.try_deliver(channel, &event);
            }
        }
    }

    /// Delivers an event to every global sink.
    pub fn emit_all(&self, event: Arc<BotEvent>) {
        let globals = self.globals.read().expect("broadcaster lock poisoned");
        for channel in globals.iter() {
            self.try_deliver(channel, &event);
        }
    }

    /// Number of sinks currently registered for `owner`.
    pub fn subscriber_count(&self, owner: &str) -> usize {
        let owners = self.owners.read().expect("broadcaster lock poisoned");
        owners.get(owner).map_or(0, Vec::len)
    }

    /// Gracefully shuts down all workers: drop every sender, await workers.
    pub async fn shutdown(&self) {
        let mut handles = Vec::new();
        {
            let mut owners = self.owners.write().expect("broadcaster lock poisoned");
            for (_, channels) in owners.drain() {
                for c in channels {
                    drop(c.sender);
                    handles.push(c.worker);
                }
            }
        }
        {
            let mut globals = self.globals.write().expect("broadcaster lock poisoned");
            for c in globals.drain(..) {
                drop(c.sender);
                handles.push(c.worker);
            }
        }
        for h in handles {
            let _ = h.await;
        }
    }

    /// Spawns the dedicated worker for one sink: bounded queue, FIFO
    /// processing, panic isolation.
    fn spawn_worker(&self, sink: Arc<dyn Subscribe>) -> SinkChannel {
        let cap = sink.queue_capacity().max(1);
        let name = sink.name();
        let (tx, mut rx) = mpsc::channel::<Arc<BotEvent>>(cap);
        let bus = self.bus.clone();

        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let fut = sink.on_event(ev.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    let info = {
                        let any = &*panic_err;
                        if let Some(msg) = any.downcast_ref::<&'static str>() {
                            (*msg).to_string()
                        } else if let Some(msg) = any.downcast_ref::<String>() {
                            msg.clone()
                        } else {
                            "unknown panic".to_string()
                        }
                    };
                    bus.publish(BotEvent::subscriber_panicked(sink.name(), info));
                }
            }
        });

        SinkChannel {
            id: SubscriberId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed)),
            name,
            sender: tx,
            worker,
        }
    }

    /// Non-blocking delivery into one sink queue; overflow drops the event
    /// for that sink only. Overflow events are never re-reported when they
    /// themselves overflow.
    fn try_deliver(&self, channel: &SinkChannel, event: &Arc<BotEvent>) {
        let is_overflow_evt = matches!(event.kind, EventKind::SubscriberOverflow);
        match channel.sender.try_send(Arc::clone(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                if !is_overflow_evt {
                    self.bus
                        .publish(BotEvent::subscriber_overflow(channel.name, "full"));
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                if !is_overflow_evt {
                    self.bus
                        .publish(BotEvent::subscriber_overflow(channel.name, "closed"));
                }
            }
        }
    }
}
