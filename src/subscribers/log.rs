//! # LogWriter — simple event printer
//!
//! A minimal global sink that prints incoming [`BotEvent`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [started] owner="alice" bot="/bots/alice/ping.sh"
//! [output] bot="/bots/alice/ping.sh" chunk="hello\n"
//! [closed] bot="/bots/alice/ping.sh" exit=0
//! [shutdown-requested]
//! ```

use async_trait::async_trait;

use crate::events::{BotEvent, EventKind};
use crate::subscribers::Subscribe;

/// Event printer sink.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &BotEvent) {
        match e.kind {
            EventKind::Started => {
                println!("[started] owner={:?} bot={:?}", e.owner, e.bot);
            }
            EventKind::Output => {
                println!("[output] bot={:?} chunk={:?}", e.bot, e.chunk);
            }
            EventKind::ErrorOutput => {
                println!("[error] bot={:?} chunk={:?}", e.bot, e.chunk);
            }
            EventKind::Closed => {
                println!(
                    "[closed] bot={:?} exit={}",
                    e.bot,
                    e.exit.map(|x| x.to_string()).unwrap_or_default()
                );
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] sink={:?} reason={:?}", e.bot, e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] sink={} info={}",
                    e.bot.as_deref().unwrap_or("unknown"),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
