use crate::api;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::MurmurConfig;
use crate::database::Database;
use crate::events::EventBus;
use crate::reputation;
use anyhow::Result;
use tokio::task::JoinHandle;

/// Bootstraps the backend once and owns the long-running pieces, handing
/// out cloned handles to whichever entrypoint (REST server, one-shot CLI
/// command, embedded runner) needs them.
pub struct MurmurNode {
    config: MurmurConfig,
    bootstrap: BootstrapResources,
    events: EventBus,
    decay_task: JoinHandle<()>,
}

impl MurmurNode {
    /// Bootstraps all persistent state and starts the background reputation
    /// decay loop.
    pub fn start(config: MurmurConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;
        let events = EventBus::default();
        let decay_task =
            reputation::spawn_decay_task(bootstrap.database.clone(), config.decay_interval_secs);

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            decay_interval_secs = config.decay_interval_secs,
            "murmur node initialized"
        );

        Ok(Self {
            config,
            bootstrap,
            events,
            decay_task,
        })
    }

    /// Clones out the handles the HTTP server and embedders share.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            config: self.config.clone(),
            database: self.bootstrap.database.clone(),
            events: self.events.clone(),
        }
    }

    /// Serves the REST API until the process is stopped.
    pub async fn run_http_server(&self) -> Result<()> {
        let snapshot = self.snapshot();
        api::serve_http(snapshot.config, snapshot.database, snapshot.events).await
    }

    /// Database handle for constructing services directly.
    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    /// Returns the in-process event bus.
    pub fn events(&self) -> EventBus {
        self.events.clone()
    }
}

impl Drop for MurmurNode {
    fn drop(&mut self) {
        self.decay_task.abort();
    }
}

/// Cloned handles suitable for consumers that just need access to backend
/// services without owning the entire node struct.
#[derive(Clone)]
pub struct NodeSnapshot {
    pub config: MurmurConfig,
    pub database: Database,
    pub events: EventBus,
}
