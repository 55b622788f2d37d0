//! # Output multiplexing for one spawned bot process.
//!
//! Converts a running process's two byte streams into ordered console
//! events without ever holding registry locks while blocked on I/O.
//!
//! ## Architecture
//! ```text
//! spawn_bot(path) ──► Child
//!                      ├─ stdout ──► read loop ──► Bus (Output chunks)
//!                      ├─ stderr ──► read loop ──► Bus (ErrorOutput chunks)
//!                      └─ wait ─────► supervise_child
//!                                      ├─ kill_token fired → start_kill (SIGKILL)
//!                                      ├─ join both read loops (drain to EOF)
//!                                      └─ return ExitReason (exactly once)
//! ```
//!
//! ## Rules
//! - Chunk ordering **within one stream** is preserved (sequential read loop);
//!   no ordering is guaranteed **between** the two streams.
//! - `supervise_child` resolves exactly once per run, also when the process
//!   was stopped via a termination request, and also when it exits before
//!   producing any output.
//! - Both readers are drained before returning, so the caller's `Closed`
//!   event follows the last output chunk of the run.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::events::{BotEvent, Bus, EventKind, ExitReason};
use crate::process::record::BotId;

/// Spawns the bot executable with piped stdout/stderr and no stdin.
///
/// `kill_on_drop` guards against leaking the OS process if the supervising
/// task is ever dropped before `wait` resolves.
pub(crate) fn spawn_bot(path: &str) -> std::io::Result<Child> {
    Command::new(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Sends the graceful termination signal (SIGTERM) to `pid`.
///
/// Returns false if the signal could not be delivered (already gone, or a
/// platform without unix signals); callers fall back to the kill token.
#[cfg(unix)]
pub(crate) fn request_termination(pid: u32) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
pub(crate) fn request_termination(_pid: u32) -> bool {
    false
}

/// Drives one run to completion: reads both output streams, waits for
/// termination, escalates to a forced kill when `kill_token` fires, and
/// returns the exit reason exactly once.
pub(crate) async fn supervise_child(
    mut child: Child,
    id: BotId,
    bus: Bus,
    kill_token: CancellationToken,
    chunk_size: usize,
) -> ExitReason {
    // Stdio was configured with `piped()` in `spawn_bot`, so `take()`
    // returns `Some` unless the caller already consumed the handles.
    let stdout_handle = child.stdout.take().map(|r| {
        tokio::spawn(read_stream(
            BufReader::new(r),
            EventKind::Output,
            id.clone(),
            bus.clone(),
            chunk_size,
        ))
    });
    let stderr_handle = child.stderr.take().map(|r| {
        tokio::spawn(read_stream(
            BufReader::new(r),
            EventKind::ErrorOutput,
            id.clone(),
            bus.clone(),
            chunk_size,
        ))
    });

    let status = tokio::select! {
        res = child.wait() => wait_status(res, &id),
        _ = kill_token.cancelled() => {
            if let Err(err) = child.start_kill() {
                tracing::warn!(bot = %id, error = %err, "force kill failed");
            }
            wait_status(child.wait().await, &id)
        }
    };

    // Drain both streams so Closed follows the last chunk. The drain is
    // bounded: an orphaned grandchild inheriting the pipe would otherwise
    // hold EOF back indefinitely.
    for mut handle in [stdout_handle, stderr_handle].into_iter().flatten() {
        if tokio::time::timeout(DRAIN_WINDOW, &mut handle).await.is_err() {
            tracing::debug!(bot = %id, "output pipe still open after exit; abandoning drain");
            handle.abort();
        }
    }

    status
}

/// Bounded wait for the read loops to reach EOF after process termination.
const DRAIN_WINDOW: Duration = Duration::from_millis(500);

/// Sequentially reads one stream and publishes each chunk as a console event.
async fn read_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    kind: EventKind,
    id: BotId,
    bus: Bus,
    chunk_size: usize,
) {
    let mut buf = vec![0u8; chunk_size];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                bus.publish(
                    BotEvent::now(kind)
                        .with_owner(id.owner_arc())
                        .with_bot(id.path_arc())
                        .with_chunk(text),
                );
            }
            Err(err) => {
                tracing::debug!(bot = %id, error = %err, "output stream read ended");
                break;
            }
        }
    }
}

fn wait_status(res: std::io::Result<ExitStatus>, id: &BotId) -> ExitReason {
    match res {
        Ok(status) => exit_reason(status),
        Err(err) => {
            // `wait` itself failed; the process state is unknowable.
            tracing::warn!(bot = %id, error = %err, "wait on bot process failed");
            ExitReason::Code(-1)
        }
    }
}

/// Maps an OS exit status onto the event payload: exit code when present,
/// otherwise the terminating signal (unix).
fn exit_reason(status: ExitStatus) -> ExitReason {
    if let Some(code) = status.code() {
        return ExitReason::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return ExitReason::Signal(sig);
        }
    }
    ExitReason::Code(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_id() -> BotId {
        BotId::new("alice", "sh")
    }

    async fn collect_run(cmd: &str, kill_after: Option<Duration>) -> (Vec<BotEvent>, ExitReason) {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let kill_token = CancellationToken::new();
        if let Some(delay) = kill_after {
            let token = kill_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                token.cancel();
            });
        }

        let reason = supervise_child(child, test_id(), bus.clone(), kill_token, 8192).await;

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        (events, reason)
    }

    #[tokio::test]
    async fn stdout_chunk_then_exit_code() {
        let (events, reason) = collect_run("echo hello", None).await;
        assert_eq!(reason, ExitReason::Code(0));
        let out: String = events
            .iter()
            .filter(|e| e.kind == EventKind::Output)
            .filter_map(|e| e.chunk.as_deref())
            .collect();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn stderr_is_tagged_separately() {
        let (events, reason) = collect_run("echo oops >&2; exit 3", None).await;
        assert_eq!(reason, ExitReason::Code(3));
        assert!(events.iter().any(|e| e.kind == EventKind::ErrorOutput
            && e.chunk.as_deref() == Some("oops\n")));
        assert!(!events.iter().any(|e| e.kind == EventKind::Output));
    }

    #[tokio::test]
    async fn silent_exit_still_resolves() {
        let (events, reason) = collect_run("exit 0", None).await;
        assert_eq!(reason, ExitReason::Code(0));
        assert!(events.iter().all(|e| e.chunk.is_none()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_token_escalates_to_sigkill() {
        let (_events, reason) =
            collect_run("sleep 30", Some(Duration::from_millis(50))).await;
        assert_eq!(reason, ExitReason::Signal(9));
    }
}
