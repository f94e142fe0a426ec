//! Shared application state
//!
//! One `AppState` is assembled at startup and cloned into every handler
//! and background task. All members are cheap handles.
//!
//! | Field | Purpose |
//! |-------|---------|
//! | `config` | Runtime configuration |
//! | `store` | Durable order buffer |
//! | `submitter` | Upstream submission seam |
//! | `monitor` | Reachability flag |
//! | `coordinator` | Sync pass lifecycle and status |
//! | `intake_signal` | Wakes the worker when an order is buffered |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::OrderStore;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProber};
use crate::core::Config;
use crate::sync::{HttpSubmitter, OrderSubmitter, SyncCoordinator, SyncWorker};
use crate::utils::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: OrderStore,
    pub submitter: Arc<dyn OrderSubmitter>,
    pub monitor: ConnectivityMonitor,
    pub coordinator: Arc<SyncCoordinator>,
    /// Bumped on every successful intake (value is the intake time)
    pub intake_signal: Arc<watch::Sender<i64>>,
}

impl AppState {
    /// Open the buffer and wire the production submitter
    pub fn initialize(config: &Config) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            crate::utils::AppError::internal(format!(
                "Failed to create work dir {}: {e}",
                config.work_dir
            ))
        })?;
        let store = OrderStore::open(config.db_path())?;
        let submitter: Arc<dyn OrderSubmitter> = Arc::new(HttpSubmitter::new(
            config.ingest_url.clone(),
            Duration::from_millis(config.ingest_timeout_ms),
            Duration::from_millis(config.probe_timeout_ms),
        )?);
        Ok(Self::assemble(config.clone(), store, submitter))
    }

    /// Wire state around an existing store and submitter.
    ///
    /// Tests use this with an in-memory store or a scripted submitter.
    pub fn assemble(
        config: Config,
        store: OrderStore,
        submitter: Arc<dyn OrderSubmitter>,
    ) -> Self {
        let monitor = ConnectivityMonitor::new();
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            submitter.clone(),
            monitor.clone(),
            config.clone(),
        ));
        let (intake_signal, _) = watch::channel(0);

        Self {
            config,
            store,
            submitter,
            monitor,
            coordinator,
            intake_signal: Arc::new(intake_signal),
        }
    }

    /// Spawn the sync worker and the connectivity prober
    pub fn start_background_tasks(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let worker = SyncWorker::new(self.clone(), shutdown.clone());
        let prober = ConnectivityProber::new(
            self.monitor.clone(),
            self.submitter.clone(),
            Duration::from_secs(self.config.probe_interval_secs),
            shutdown,
        );
        vec![tokio::spawn(worker.run()), tokio::spawn(prober.run())]
    }
}
