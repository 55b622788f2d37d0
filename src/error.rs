//! Error types used by the botvisor runtime.
//!
//! This module defines the caller-facing error taxonomy:
//!
//! - [`StartError`] — failures of the `start` operation.
//! - [`StopError`] — failures of the `stop` operation.
//! - [`StatusError`] — failures of read-only lookups.
//! - [`RuntimeError`] — errors raised by the supervision runtime itself.
//!
//! All types provide `as_label()` returning a short stable snake_case label
//! for logs/metrics. A process crash is deliberately **not** an error here:
//! unsolicited termination surfaces as a `Closed` event with an abnormal
//! exit reason, never through a `start`/`stop` result.

use std::time::Duration;
use thiserror::Error;

/// # Errors returned by `start`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// A record for this identity is already in a non-terminal state;
    /// no new process was spawned.
    #[error("bot is already running")]
    AlreadyRunning,

    /// The caller does not own the referenced artifact.
    #[error("bot is not owned by the caller")]
    Forbidden,

    /// No such artifact is known for this owner.
    #[error("no such bot")]
    NotFound,

    /// The OS failed to create the process (artifact missing, not
    /// executable, ...). The record was moved to `Exited` with no exit code.
    #[error("failed to spawn bot process: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::AlreadyRunning => "start_already_running",
            StartError::Forbidden => "start_forbidden",
            StartError::NotFound => "start_not_found",
            StartError::SpawnFailed { .. } => "start_spawn_failed",
        }
    }
}

/// # Errors returned by `stop`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StopError {
    /// No record exists, or the record is `Stopped`/`Exited`.
    #[error("bot is not running")]
    NotRunning,

    /// The caller does not own the referenced artifact.
    #[error("bot is not owned by the caller")]
    Forbidden,

    /// No such artifact is known for this owner.
    #[error("no such bot")]
    NotFound,
}

impl StopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StopError::NotRunning => "stop_not_running",
            StopError::Forbidden => "stop_forbidden",
            StopError::NotFound => "stop_not_found",
        }
    }
}

/// # Errors returned by read-only lookups (`status`).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StatusError {
    /// The caller does not own the referenced artifact.
    #[error("bot is not owned by the caller")]
    Forbidden,

    /// No such artifact is known for this owner.
    #[error("no such bot")]
    NotFound,
}

impl StatusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StatusError::Forbidden => "status_forbidden",
            StatusError::NotFound => "status_not_found",
        }
    }
}

/// # Errors produced by the supervision runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the listed bots were still alive
    /// and had to be force-killed.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}; forcing kill")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Bot paths that did not exit in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(StartError::AlreadyRunning.as_label(), "start_already_running");
        assert_eq!(StopError::NotRunning.as_label(), "stop_not_running");
        assert_eq!(
            RuntimeError::GraceExceeded {
                grace: Duration::from_secs(5),
                stuck: vec![]
            }
            .as_label(),
            "runtime_grace_exceeded"
        );
    }
}
