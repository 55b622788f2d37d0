//! Termination-signal handling for supervisor hosts.
//!
//! The library never installs signal handlers on its own: a host (the
//! `botvisord` daemon, a test harness, an embedder) decides when the
//! runtime dies. [`wait_for_shutdown_signal`] is the helper a host awaits
//! to drive [`Supervisor::shutdown`](crate::Supervisor::shutdown), which
//! stops every active bot within the configured grace period.
//!
//! On unix the helper resolves on `SIGINT`, `SIGTERM` (systemd/Kubernetes
//! stop), or `SIGQUIT`; elsewhere only Ctrl-C is available.
//!
//! ```no_run
//! use botvisor::{wait_for_shutdown_signal, Config, Supervisor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let sup = Supervisor::builder(Config::default()).build();
//! wait_for_shutdown_signal().await?;
//! sup.shutdown().await?;
//! # Ok(())
//! # }
//! ```

/// Resolves when the host process receives a termination signal.
///
/// Each call registers independent listeners, so concurrent waiters all
/// observe the same signal. Returns `Err` only if listener registration
/// fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Resolves when the host process receives Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
