//! # Supervisor: the façade over registry, broadcaster, and catalog.
//!
//! The [`Supervisor`] is the service object the request layer talks to. It
//! owns the event bus, the [`Registry`], the [`Broadcaster`], and the
//! artifact [`Catalog`]; it enforces the authorization rule (the caller's
//! owner identity must own the artifact) before any registry call, and it
//! routes owner-scoped console events from the bus into the broadcaster.
//!
//! ## High-level architecture
//! ```text
//! caller ──► Supervisor::start/stop/status ──► Catalog (owns? known?)
//!                                         └──► Registry (spawn / signal / snapshot)
//!                                                   │
//!                       stdout/stderr readers ──► Bus ◄── exit callbacks
//!                                                   │
//!                                         console listener (here)
//!                                          ├──► Broadcaster.emit_all  (global sinks)
//!                                          └──► Broadcaster.publish   (owner's sinks,
//!                                               Output/ErrorOutput/Closed only)
//! ```
//!
//! ## Shutdown path
//! ```text
//! shutdown():
//!   Bus.publish(ShutdownRequested)
//!   stop every active bot (SIGTERM now, SIGKILL at grace)
//!   wait for all exit callbacks:
//!     ├─ all Exited in time → Bus.publish(AllStoppedWithin), Ok
//!     └─ window exceeded    → Bus.publish(GraceExceeded),
//!                             Err(RuntimeError::GraceExceeded { stuck })
//! ```
//!
//! Construct through [`Supervisor::builder`]; pass the `Arc` by reference to
//! request handlers rather than capturing ambient globals — isolated
//! instances keep tests hermetic and teardown clean.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::core::builder::SupervisorBuilder;
use crate::core::registry::Registry;
use crate::error::{RuntimeError, StartError, StatusError, StopError};
use crate::events::{BotEvent, Bus, EventKind};
use crate::process::{BotId, ProcessSnapshot};
use crate::subscribers::{Broadcaster, Subscribe, SubscriberId};

/// Outcome of the catalog authorization check.
enum Access {
    Granted,
    Forbidden,
    Unknown,
}

/// Coordinates process supervision, per-owner event delivery, and shutdown.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    registry: Arc<Registry>,
    broadcaster: Arc<Broadcaster>,
    catalog: Arc<dyn Catalog>,
}

impl Supervisor {
    /// Returns a builder for wiring config, catalog, and global sinks.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        registry: Arc<Registry>,
        broadcaster: Arc<Broadcaster>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            broadcaster,
            catalog,
        }
    }

    /// The runtime event bus (mainly for tests and embedders).
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The artifact catalog this supervisor authorizes against.
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Starts `owner`'s bot at `path`.
    ///
    /// Authorization first: unknown path ⇒ `NotFound`, known path not owned
    /// by `owner` ⇒ `Forbidden`. Only then does the registry get involved.
    pub async fn start(&self, owner: &str, path: &str) -> Result<(), StartError> {
        match self.authorize(owner, path).await {
            Access::Granted => {}
            Access::Forbidden => return Err(StartError::Forbidden),
            Access::Unknown => return Err(StartError::NotFound),
        }
        self.registry.start(BotId::new(owner, path)).await
    }

    /// Requests termination of `owner`'s bot at `path`.
    ///
    /// Returns once the termination request is issued; the exit confirmation
    /// arrives as a `Closed` event on the owner's stream.
    pub async fn stop(&self, owner: &str, path: &str) -> Result<(), StopError> {
        match self.authorize(owner, path).await {
            Access::Granted => {}
            Access::Forbidden => return Err(StopError::Forbidden),
            Access::Unknown => return Err(StopError::NotFound),
        }
        self.registry.stop(&BotId::new(owner, path)).await
    }

    /// Read-only snapshot of `owner`'s bot at `path`.
    pub async fn status(&self, owner: &str, path: &str) -> Result<ProcessSnapshot, StatusError> {
        match self.authorize(owner, path).await {
            Access::Granted => {}
            Access::Forbidden => return Err(StatusError::Forbidden),
            Access::Unknown => return Err(StatusError::NotFound),
        }
        Ok(self.registry.status(&BotId::new(owner, path)).await)
    }

    /// Sorted list of the owner's bot paths.
    pub async fn list_bots(&self, owner: &str) -> Vec<String> {
        self.catalog.list(owner).await
    }

    /// Registers a console sink for `owner`; it observes that owner's
    /// `Output`/`ErrorOutput`/`Closed` events from this point forward.
    pub fn subscribe(&self, owner: &str, sink: Arc<dyn Subscribe>) -> SubscriberId {
        self.broadcaster.subscribe(owner, sink)
    }

    /// Deregisters a console sink (connection closed).
    pub fn unsubscribe(&self, owner: &str, id: SubscriberId) {
        self.broadcaster.unsubscribe(owner, id)
    }

    /// Registers a global observability sink (receives every event).
    pub fn subscribe_all(&self, sink: Arc<dyn Subscribe>) -> SubscriberId {
        self.broadcaster.subscribe_all(sink)
    }

    /// Deregisters a global observability sink.
    pub fn unsubscribe_all(&self, id: SubscriberId) {
        self.broadcaster.unsubscribe_all(id)
    }

    /// Stops every active bot and waits for all of them to exit.
    ///
    /// The wait window is the grace period plus a fixed margin: the SIGKILL
    /// escalation fires *at* the grace boundary and the exit callbacks land
    /// just after it. Bots still active at the end of the window are
    /// reported via [`RuntimeError::GraceExceeded`].
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(BotEvent::now(EventKind::ShutdownRequested));

        for id in self.registry.active().await {
            if let Err(err) = self.registry.stop(&id).await {
                tracing::debug!(bot = %id, error = %err, "stop during shutdown");
            }
        }

        let window = self.cfg.grace + Duration::from_secs(1);
        let all_exited = async {
            loop {
                if self.registry.active().await.is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        };

        match tokio::time::timeout(window, all_exited).await {
            Ok(()) => {
                self.bus.publish(BotEvent::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(BotEvent::now(EventKind::GraceExceeded));
                let stuck = self
                    .registry
                    .active()
                    .await
                    .into_iter()
                    .map(|id| id.path().to_string())
                    .collect();
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.grace,
                    stuck,
                })
            }
        }
    }

    /// Routes bus events into the broadcaster. Spawned once by the builder.
    pub(crate) fn spawn_console_listener(bus: &Bus, broadcaster: Arc<Broadcaster>) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let ev = Arc::new(ev);
                        broadcaster.emit_all(Arc::clone(&ev));
                        if ev.is_console() {
                            if let Some(owner) = ev.owner.as_deref() {
                                broadcaster.publish(owner, Arc::clone(&ev));
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "console listener lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn authorize(&self, owner: &str, path: &str) -> Access {
        if self.catalog.owns(owner, path).await {
            Access::Granted
        } else if self.catalog.known(path).await {
            Access::Forbidden
        } else {
            Access::Unknown
        }
    }
}
