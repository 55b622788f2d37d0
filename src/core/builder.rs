//! Builder wiring for [`Supervisor`].
//!
//! Order of construction matters only in one place: the console listener
//! subscribes to the bus *before* `build` returns, so no event published
//! after construction can be missed by registered sinks.

use std::sync::Arc;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::Config;
use crate::core::registry::Registry;
use crate::core::supervisor::Supervisor;
use crate::events::Bus;
use crate::subscribers::{Broadcaster, Subscribe};

/// Assembles a [`Supervisor`] from config, an optional catalog, and any
/// number of global sinks.
///
/// ```no_run
/// use botvisor::{Config, Supervisor};
///
/// # async fn demo() {
/// let sup = Supervisor::builder(Config::default()).build();
/// sup.start("alice", "/var/bots/alice/bot.sh").await.ok();
/// # }
/// ```
pub struct SupervisorBuilder {
    cfg: Config,
    catalog: Option<Arc<dyn Catalog>>,
    global_sinks: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub(crate) fn new(cfg: Config) -> Self {
        Self {
            cfg,
            catalog: None,
            global_sinks: Vec::new(),
        }
    }

    /// Uses a custom artifact catalog instead of the in-memory default.
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Registers a global sink that observes every runtime event.
    pub fn with_sink(mut self, sink: Arc<dyn Subscribe>) -> Self {
        self.global_sinks.push(sink);
        self
    }

    /// Wires the bus, registry, and broadcaster and spawns the console
    /// listener. Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let registry = Registry::new(bus.clone(), self.cfg.clone());
        let broadcaster = Arc::new(Broadcaster::new(bus.clone()));
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(MemoryCatalog::new()));

        for sink in self.global_sinks {
            broadcaster.subscribe_all(sink);
        }
        Supervisor::spawn_console_listener(&bus, Arc::clone(&broadcaster));

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            registry,
            broadcaster,
            catalog,
        ))
    }
}
