//! # botvisor
//!
//! Async supervision runtime for user-owned bot processes: upload an
//! executable, start and stop it as a child process, watch its combined
//! stdout/stderr live, and get exactly one exit notification per run.
//!
//! ## High-level architecture
//! ```text
//!               ┌────────────────────────────────────────────┐
//!               │                 Supervisor                 │
//!               │  (authorization façade + console routing)  │
//!               └──────┬──────────────┬──────────────┬───────┘
//!                      │              │              │
//!                   Catalog        Registry      Broadcaster
//!               (owner → paths) (id → record)  (owner → sinks)
//!                                    │              ▲
//!                               spawn / signal      │ Output / ErrorOutput
//!                                    │              │ Closed (per owner)
//!                                  Child ──────► Bus (broadcast)
//!                            (stdout/stderr readers, waiter)
//! ```
//!
//! ## Semantics
//! - **At most one run per identity**: an identity is `(owner, path)`; a
//!   second `start` while the record is active fails with `AlreadyRunning`,
//!   checked and committed under a per-identity lock.
//! - **Exactly one `Closed` per run**: the exit notification carries the
//!   exit code or terminating signal and follows the run's last output
//!   chunk; a failed spawn is not a run and produces no `Closed`.
//! - **Graceful stop**: `stop` sends SIGTERM, then escalates to SIGKILL
//!   after the configured grace period.
//! - **Owner isolation**: console sinks registered under one owner never
//!   observe another owner's events; a slow or panicking sink affects only
//!   itself.
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use botvisor::{BotEvent, Config, Subscribe, Supervisor};
//!
//! struct Console;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Console {
//!     async fn on_event(&self, event: &BotEvent) {
//!         if let Some(chunk) = event.chunk.as_deref() {
//!             print!("{chunk}");
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::builder(Config::default()).build();
//!     sup.catalog().add("alice", "/var/bots/alice/bot.sh").await;
//!
//!     let id = sup.subscribe("alice", Arc::new(Console));
//!     sup.start("alice", "/var/bots/alice/bot.sh").await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!     sup.stop("alice", "/var/bots/alice/bot.sh").await?;
//!
//!     sup.unsubscribe("alice", id);
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//! - `server` *(default)*: HTTP/WebSocket control panel (`axum`) and the
//!   `botvisord` binary.
//! - `logging`: [`LogWriter`], a stdout sink for demos and debugging.

mod catalog;
mod config;
mod core;
mod error;
mod events;
mod process;
mod subscribers;

#[cfg(feature = "server")]
pub mod server;

pub use catalog::{Catalog, MemoryCatalog};
pub use config::Config;
pub use crate::core::{wait_for_shutdown_signal, Registry, Supervisor, SupervisorBuilder};
pub use error::{RuntimeError, StartError, StatusError, StopError};
pub use events::{BotEvent, Bus, EventKind, ExitReason};
pub use process::{BotId, ProcessSnapshot, ProcessState};
pub use subscribers::{Broadcaster, Subscribe, SubscriberId};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
