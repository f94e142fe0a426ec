//! Connectivity monitor for the upstream ingestion endpoint
//!
//! One boolean behind a watch channel. The prober refreshes it on an
//! interval; repeated identical observations are swallowed, so
//! subscribers only ever wake on real transitions. The sync worker
//! debounces the offline-to-online edge before it triggers a pass.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::sync::OrderSubmitter;

/// Shared reachability flag; cheap to clone
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Starts unreachable; the first probe settles the real state
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Last observed reachability
    pub fn is_reachable(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record an observation. Only actual transitions are published.
    pub fn set_reachable(&self, reachable: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == reachable {
                return false;
            }
            *current = reachable;
            true
        });

        if changed {
            if reachable {
                tracing::info!("Upstream reachable, link is online");
            } else {
                tracing::warn!("Upstream unreachable, orders will buffer offline");
            }
        }
    }

    /// Subscribe to transitions; receivers see the latest value
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that keeps the monitor honest by pinging the
/// ingestion endpoint on an interval
pub struct ConnectivityProber {
    monitor: ConnectivityMonitor,
    submitter: Arc<dyn OrderSubmitter>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ConnectivityProber {
    pub fn new(
        monitor: ConnectivityMonitor,
        submitter: Arc<dyn OrderSubmitter>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self { monitor, submitter, interval, shutdown }
    }

    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "ConnectivityProber started");

        let mut tick = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("ConnectivityProber shutting down");
                    break;
                }

                _ = tick.tick() => {
                    let reachable = self.submitter.ping().await;
                    self.monitor.set_reachable(reachable);
                }
            }
        }
    }
}
