//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (process readers,
//! registry, supervisor).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Subscriber (one):
//!   stdout reader ──┐
//!   stderr reader ──┼──────► Bus ───────► console_listener ────► Broadcaster
//!   waiter        ──┤  (broadcast chan)    (in Supervisor)      (per-owner sinks)
//!   registry      ──┘
//! ```
//!
//! botvisor uses a single subscriber (`Supervisor`'s console listener) that
//! routes owner-scoped events to the [`Broadcaster`](crate::Broadcaster).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::BotEvent;

/// Broadcast channel for runtime events.
///
/// Thin wrapper over [`tokio::sync::broadcast`] that provides a
/// `publish`/`subscribe` API. Multiple publishers can publish concurrently;
/// receivers observe clones of each event.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<BotEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// ### Notes
    /// - Capacity is **shared** across all receivers (not per-subscriber).
    /// - When receivers lag, they will observe `RecvError::Lagged`.
    /// - The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<BotEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// - Takes ownership of the event; the broadcast channel clones it per receiver.
    /// - If there are no receivers, the event is dropped (still returns immediately).
    pub fn publish(&self, ev: BotEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// - Each call creates an **independent** receiver.
    /// - A receiver only gets events **sent after** it subscribes.
    /// - Slow receivers get `RecvError::Lagged(n)` and skip over missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    /// Publishes a borrowed event by cloning it.
    ///
    /// Shorthand for `publish(ev.clone())`, useful when you already have a reference.
    pub fn publish_ref(&self, ev: &BotEvent) {
        let _ = self.tx.send(ev.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn publish_reaches_receiver() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(BotEvent::now(EventKind::Started).with_bot("/b/ping.sh"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Started);
        assert_eq!(ev.bot.as_deref(), Some("/b/ping.sh"));
    }

    #[tokio::test]
    async fn publish_without_receivers_is_dropped() {
        let bus = Bus::new(8);
        // No receiver; must not block or panic.
        bus.publish(BotEvent::now(EventKind::ShutdownRequested));
        let mut rx = bus.subscribe();
        bus.publish(BotEvent::now(EventKind::Started));
        // Only the post-subscribe event is observed.
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Started);
    }
}
