//! End-to-end runs through the supervisor façade: upload-equivalent catalog
//! registration, start/stop/status, per-owner console delivery, shutdown.

#![cfg(unix)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use botvisor::{
    BotEvent, Config, EventKind, ExitReason, ProcessState, StartError, StatusError, StopError,
    Subscribe, Supervisor,
};

/// Writes an executable shell script and returns its path.
fn script(dir: &TempDir, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "#!/bin/sh\n{body}").unwrap();
    f.sync_all().unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_str().unwrap().to_string()
}

struct Collector {
    tx: UnboundedSender<BotEvent>,
}

#[async_trait]
impl Subscribe for Collector {
    async fn on_event(&self, event: &BotEvent) {
        let _ = self.tx.send(event.clone());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

fn collector() -> (Arc<Collector>, UnboundedReceiver<BotEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Collector { tx }), rx)
}

async fn recv_until_closed(rx: &mut UnboundedReceiver<BotEvent>) -> Vec<BotEvent> {
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut events = Vec::new();
        loop {
            let ev = rx.recv().await.expect("sink channel closed early");
            let done = ev.kind == EventKind::Closed;
            events.push(ev);
            if done {
                break events;
            }
        }
    })
    .await
    .expect("no Closed event within timeout")
}

#[tokio::test]
async fn full_run_streams_output_then_closes() {
    let dir = TempDir::new().unwrap();
    let path = script(&dir, "hello.sh", "echo hello");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &path).await;

    let (sink, mut rx) = collector();
    sup.subscribe("alice", sink);
    sup.start("alice", &path).await.unwrap();

    let events = recv_until_closed(&mut rx).await;

    let out: String = events
        .iter()
        .filter(|e| e.kind == EventKind::Output)
        .filter_map(|e| e.chunk.as_deref())
        .collect();
    assert_eq!(out, "hello\n");

    // The exit notification comes after every output chunk of the run.
    let closed = events.last().unwrap();
    assert_eq!(closed.kind, EventKind::Closed);
    assert_eq!(closed.exit, Some(ExitReason::Code(0)));
    assert_eq!(closed.bot.as_deref(), Some(path.as_str()));

    let snap = sup.status("alice", &path).await.unwrap();
    assert_eq!(snap.state, ProcessState::Exited);
    assert_eq!(snap.exit, Some(ExitReason::Code(0)));
}

#[tokio::test]
async fn console_events_are_isolated_per_owner() {
    let dir = TempDir::new().unwrap();
    let alice_bot = script(&dir, "alice.sh", "echo from-alice");
    let bob_bot = script(&dir, "bob.sh", "echo from-bob");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &alice_bot).await;
    sup.catalog().add("bob", &bob_bot).await;

    let (alice_sink, mut alice_rx) = collector();
    let (bob_sink, mut bob_rx) = collector();
    sup.subscribe("alice", alice_sink);
    sup.subscribe("bob", bob_sink);

    sup.start("alice", &alice_bot).await.unwrap();
    sup.start("bob", &bob_bot).await.unwrap();

    let alice_events = recv_until_closed(&mut alice_rx).await;
    let bob_events = recv_until_closed(&mut bob_rx).await;

    assert!(alice_events
        .iter()
        .all(|e| e.owner.as_deref() == Some("alice")));
    assert!(bob_events.iter().all(|e| e.owner.as_deref() == Some("bob")));
    assert!(alice_events
        .iter()
        .filter_map(|e| e.chunk.as_deref())
        .any(|c| c.contains("from-alice")));
    assert!(!bob_events
        .iter()
        .filter_map(|e| e.chunk.as_deref())
        .any(|c| c.contains("from-alice")));
}

#[tokio::test]
async fn isolation_holds_under_randomized_interleavings() {
    use rand::Rng;

    let dir = TempDir::new().unwrap();
    // Multi-chunk output so the two bots' chunks interleave on the bus.
    let alice_bot = script(
        &dir,
        "alice.sh",
        "for i in 1 2 3 4 5; do echo alice-$i; done",
    );
    let bob_bot = script(&dir, "bob.sh", "for i in 1 2 3 4 5; do echo bob-$i; done");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &alice_bot).await;
    sup.catalog().add("bob", &bob_bot).await;

    for round in 0..8 {
        let (alice_sink, mut alice_rx) = collector();
        let (bob_sink, mut bob_rx) = collector();
        let alice_id = sup.subscribe("alice", alice_sink);
        let bob_id = sup.subscribe("bob", bob_sink);

        // Jitter the launch order and spacing every round.
        let (first, second, first_bot, second_bot) = if rand::thread_rng().gen_bool(0.5) {
            ("alice", "bob", &alice_bot, &bob_bot)
        } else {
            ("bob", "alice", &bob_bot, &alice_bot)
        };
        sup.start(first, first_bot).await.unwrap();
        let jitter = rand::thread_rng().gen_range(0..10);
        tokio::time::sleep(Duration::from_millis(jitter)).await;
        sup.start(second, second_bot).await.unwrap();

        let alice_events = recv_until_closed(&mut alice_rx).await;
        let bob_events = recv_until_closed(&mut bob_rx).await;

        for ev in &alice_events {
            assert_eq!(
                ev.owner.as_deref(),
                Some("alice"),
                "round {round}: foreign event in alice's sink: {ev:?}"
            );
            if let Some(chunk) = ev.chunk.as_deref() {
                assert!(!chunk.contains("bob-"), "round {round}: leaked chunk {chunk:?}");
            }
        }
        for ev in &bob_events {
            assert_eq!(
                ev.owner.as_deref(),
                Some("bob"),
                "round {round}: foreign event in bob's sink: {ev:?}"
            );
            if let Some(chunk) = ev.chunk.as_deref() {
                assert!(
                    !chunk.contains("alice-"),
                    "round {round}: leaked chunk {chunk:?}"
                );
            }
        }

        // Each owner still saw their own complete run.
        let alice_out: String = alice_events
            .iter()
            .filter_map(|e| e.chunk.as_deref())
            .collect();
        assert!(alice_out.contains("alice-5"));
        let bob_out: String = bob_events.iter().filter_map(|e| e.chunk.as_deref()).collect();
        assert!(bob_out.contains("bob-5"));

        sup.unsubscribe("alice", alice_id);
        sup.unsubscribe("bob", bob_id);
    }
}

#[tokio::test]
async fn foreign_bots_are_forbidden_unknown_are_not_found() {
    let dir = TempDir::new().unwrap();
    let bot = script(&dir, "alice.sh", "echo hi");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &bot).await;

    // Bob knows the path but does not own it.
    assert!(matches!(
        sup.start("bob", &bot).await,
        Err(StartError::Forbidden)
    ));
    assert!(matches!(
        sup.stop("bob", &bot).await,
        Err(StopError::Forbidden)
    ));
    assert!(matches!(
        sup.status("bob", &bot).await,
        Err(StatusError::Forbidden)
    ));

    // A path nobody registered.
    assert!(matches!(
        sup.start("alice", "/no/such/bot.sh").await,
        Err(StartError::NotFound)
    ));
    assert!(matches!(
        sup.status("alice", "/no/such/bot.sh").await,
        Err(StatusError::NotFound)
    ));
}

#[tokio::test]
async fn registered_but_never_started_reads_stopped() {
    let dir = TempDir::new().unwrap();
    let bot = script(&dir, "idle.sh", "echo hi");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &bot).await;

    let snap = sup.status("alice", &bot).await.unwrap();
    assert_eq!(snap.state, ProcessState::Stopped);
    assert_eq!(snap.pid, None);
    assert_eq!(snap.exit, None);

    assert!(matches!(
        sup.stop("alice", &bot).await,
        Err(StopError::NotRunning)
    ));
}

#[tokio::test]
async fn stop_terminates_a_long_running_bot() {
    let dir = TempDir::new().unwrap();
    let bot = script(&dir, "long.sh", "sleep 30");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &bot).await;

    let (sink, mut rx) = collector();
    sup.subscribe("alice", sink);
    sup.start("alice", &bot).await.unwrap();
    sup.stop("alice", &bot).await.unwrap();

    let events = recv_until_closed(&mut rx).await;
    let closed = events.last().unwrap();
    assert_eq!(closed.exit, Some(ExitReason::Signal(15)));

    let snap = sup.status("alice", &bot).await.unwrap();
    assert_eq!(snap.state, ProcessState::Exited);
}

#[tokio::test]
async fn list_bots_reflects_catalog() {
    let dir = TempDir::new().unwrap();
    let a = script(&dir, "a.sh", "echo a");
    let b = script(&dir, "b.sh", "echo b");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &b).await;
    sup.catalog().add("alice", &a).await;

    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(sup.list_bots("alice").await, expected);
    assert!(sup.list_bots("bob").await.is_empty());
}

#[tokio::test]
async fn shutdown_stops_everything_within_grace() {
    let dir = TempDir::new().unwrap();
    let bot = script(&dir, "long.sh", "sleep 30");
    let sup = Supervisor::builder(Config {
        grace: Duration::from_millis(500),
        ..Config::default()
    })
    .build();
    sup.catalog().add("alice", &bot).await;

    let mut bus_rx = sup.bus().subscribe();
    sup.start("alice", &bot).await.unwrap();
    sup.shutdown().await.unwrap();

    let snap = sup.status("alice", &bot).await.unwrap();
    assert_eq!(snap.state, ProcessState::Exited);

    let mut saw_requested = false;
    let mut saw_all_stopped = false;
    while let Ok(ev) = bus_rx.try_recv() {
        match ev.kind {
            EventKind::ShutdownRequested => saw_requested = true,
            EventKind::AllStoppedWithin => saw_all_stopped = true,
            _ => {}
        }
    }
    assert!(saw_requested);
    assert!(saw_all_stopped);
}

#[tokio::test]
async fn crash_surfaces_as_closed_event_not_error() {
    let dir = TempDir::new().unwrap();
    let bot = script(&dir, "crash.sh", "echo dying >&2; exit 7");
    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("alice", &bot).await;

    let (sink, mut rx) = collector();
    sup.subscribe("alice", sink);
    sup.start("alice", &bot).await.unwrap();

    let events = recv_until_closed(&mut rx).await;
    assert!(events
        .iter()
        .any(|e| e.kind == EventKind::ErrorOutput
            && e.chunk.as_deref() == Some("dying\n")));
    assert_eq!(events.last().unwrap().exit, Some(ExitReason::Code(7)));

    // The identity is immediately restartable after the crash.
    sup.start("alice", &bot).await.unwrap();
    let events = recv_until_closed(&mut rx).await;
    assert_eq!(events.last().unwrap().exit, Some(ExitReason::Code(7)));
}
