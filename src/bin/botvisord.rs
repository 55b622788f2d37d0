//! Bot supervision daemon: HTTP/WebSocket panel in front of the runtime.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use botvisor::server::{AppState, AuthService};
use botvisor::{wait_for_shutdown_signal, Config, Supervisor};

#[derive(Parser, Debug)]
#[command(name = "botvisord", about = "Bot process supervision daemon")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Root directory for uploaded bot executables.
    #[arg(long, default_value = "user_bots")]
    bots_dir: PathBuf,

    /// Seconds to wait after SIGTERM before force-killing a bot.
    #[arg(long, default_value_t = 5)]
    grace: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tokio::fs::create_dir_all(&args.bots_dir).await?;

    let cfg = Config {
        grace: Duration::from_secs(args.grace),
        ..Config::default()
    };
    let supervisor = Supervisor::builder(cfg).build();
    let state = AppState::new(
        Arc::clone(&supervisor),
        Arc::new(AuthService::new()),
        args.bots_dir,
    );

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %args.listen, "botvisord listening");

    axum::serve(listener, botvisor::server::router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = wait_for_shutdown_signal().await {
                tracing::error!(error = %err, "signal listener failed");
            }
        })
        .await?;

    tracing::info!("shutting down; stopping active bots");
    if let Err(err) = supervisor.shutdown().await {
        tracing::warn!(error = %err, "some bots did not exit in time");
    }
    Ok(())
}
