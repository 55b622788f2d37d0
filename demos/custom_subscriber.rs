//! A hand-rolled console sink: receives one owner's live output.
//!
//! Run with: `cargo run --example custom_subscriber`

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use botvisor::{BotEvent, Config, EventKind, Subscribe, Supervisor};

/// Prints output chunks as they arrive and announces the exit.
struct Console;

#[async_trait::async_trait]
impl Subscribe for Console {
    async fn on_event(&self, event: &BotEvent) {
        match event.kind {
            EventKind::Output | EventKind::ErrorOutput => {
                if let Some(chunk) = event.chunk.as_deref() {
                    print!("{chunk}");
                }
            }
            EventKind::Closed => {
                let exit = event.exit.map(|e| e.to_string()).unwrap_or_default();
                println!("-- bot exited ({exit}) --");
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("botvisor-demo");
    std::fs::create_dir_all(&dir)?;
    let script = dir.join("countdown.sh");
    {
        let mut f = std::fs::File::create(&script)?;
        writeln!(f, "#!/bin/sh\nfor i in 3 2 1; do echo $i; sleep 1; done")?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    }
    let path = script.to_string_lossy().into_owned();

    let sup = Supervisor::builder(Config::default()).build();
    sup.catalog().add("demo", &path).await;

    let id = sup.subscribe("demo", Arc::new(Console));
    sup.start("demo", &path).await?;

    // Wait out the countdown plus a margin for the Closed event.
    tokio::time::sleep(Duration::from_secs(4)).await;

    sup.unsubscribe("demo", id);
    sup.shutdown().await?;
    Ok(())
}
