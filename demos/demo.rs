//! End-to-end walkthrough: register a bot, run it, watch it, stop it.
//!
//! Run with: `cargo run --example demo --features logging`

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use botvisor::{Config, LogWriter, Supervisor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A throwaway bot: prints a heartbeat until terminated.
    let dir = std::env::temp_dir().join("botvisor-demo");
    std::fs::create_dir_all(&dir)?;
    let script = dir.join("heartbeat.sh");
    {
        let mut f = std::fs::File::create(&script)?;
        writeln!(f, "#!/bin/sh\nwhile true; do echo beat; sleep 1; done")?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    }
    let path = script.to_string_lossy().into_owned();

    let sup = Supervisor::builder(Config {
        grace: Duration::from_secs(2),
        ..Config::default()
    })
    .with_sink(Arc::new(LogWriter))
    .build();

    sup.catalog().add("demo", &path).await;
    sup.start("demo", &path).await?;
    println!("bot running; watching for 3 seconds");
    tokio::time::sleep(Duration::from_secs(3)).await;

    sup.stop("demo", &path).await?;
    sup.shutdown().await?;
    println!("done");
    Ok(())
}
