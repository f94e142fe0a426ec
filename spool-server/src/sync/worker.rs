//! Background sync worker
//!
//! Owns every automatic trigger of the sync coordinator:
//!
//! * startup: reset stranded in-flight records, then drain any backlog
//! * reconnect: offline-to-online transitions, debounced so a flapping
//!   link produces exactly one pass once it settles
//! * intake: a freshly buffered order while online
//! * rescan: periodic sweep that also picks up backoff expiries
//!
//! Scheduled triggers respect the coordinator's backoff gate and the
//! reachability flag; manual triggers (the API) go straight to the
//! coordinator and bypass both.

use std::time::Duration;

use shared::status::SyncTrigger;
use shared::util::now_millis;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::AppState;

pub struct SyncWorker {
    state: AppState,
    shutdown: CancellationToken,
}

impl SyncWorker {
    pub fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    pub async fn run(self) {
        tracing::info!("SyncWorker started");

        // Records stranded in flight by a crash go back to pending before
        // anything is claimed
        match self.state.store.reset_in_flight() {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!(count, "Reset stranded in-flight orders back to pending");
            }
            Err(e) => tracing::error!(error = %e, "Failed to reset in-flight orders"),
        }
        self.state.coordinator.refresh_status();

        // Settle reachability once so the startup pass has a real answer
        let reachable = self.state.submitter.ping().await;
        self.state.monitor.set_reachable(reachable);
        if reachable && self.pending_backlog() > 0 {
            let _ = self.state.coordinator.run_sync(SyncTrigger::Startup).await;
        }

        let mut connectivity_rx = self.state.monitor.subscribe();
        let mut intake_rx = self.state.intake_signal.subscribe();

        let mut rescan =
            tokio::time::interval(Duration::from_secs(self.state.config.rescan_interval_secs));
        rescan.tick().await; // the first tick fires immediately, skip it

        let debounce = Duration::from_millis(self.state.config.online_debounce_ms);
        let mut online_deadline: Option<Instant> = None;

        loop {
            let sleep_until =
                online_deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("SyncWorker shutting down");
                    self.final_flush().await;
                    break;
                }

                // Settled end of an offline-to-online transition
                _ = tokio::time::sleep_until(sleep_until), if online_deadline.is_some() => {
                    online_deadline = None;
                    if self.state.monitor.is_reachable() {
                        tracing::info!("Link settled online, starting sync");
                        self.state.coordinator.reset_backoff();
                        let _ = self.state.coordinator.run_sync(SyncTrigger::Reconnect).await;
                    }
                }

                result = connectivity_rx.changed() => {
                    if result.is_err() {
                        break;
                    }
                    let online = *connectivity_rx.borrow_and_update();
                    if online {
                        // Re-arm on every flap; only a settled link fires
                        online_deadline = Some(Instant::now() + debounce);
                    } else {
                        online_deadline = None;
                    }
                }

                result = intake_rx.changed() => {
                    if result.is_err() {
                        break;
                    }
                    let _ = intake_rx.borrow_and_update();
                    if self.should_run_scheduled() {
                        let _ = self.state.coordinator.run_sync(SyncTrigger::Intake).await;
                    }
                }

                _ = rescan.tick() => {
                    if self.should_run_scheduled() && self.pending_backlog() > 0 {
                        let _ = self.state.coordinator.run_sync(SyncTrigger::Rescan).await;
                    }
                }
            }
        }

        tracing::info!("SyncWorker stopped");
    }

    /// Reachable and not inside a failure backoff window
    fn should_run_scheduled(&self) -> bool {
        self.state.monitor.is_reachable()
            && !self.state.coordinator.in_backoff(now_millis())
    }

    fn pending_backlog(&self) -> u64 {
        match self.state.store.counts() {
            Ok(counts) => counts.pending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read buffer counts");
                0
            }
        }
    }

    /// One last drain attempt on shutdown so a healthy link does not
    /// leave orders behind
    async fn final_flush(&self) {
        if !self.state.monitor.is_reachable() || self.pending_backlog() == 0 {
            return;
        }
        tracing::info!("Final sync before shutdown");
        if let Some(report) =
            self.state.coordinator.run_sync(SyncTrigger::Rescan).await.wait().await
        {
            tracing::info!(synced = report.synced, "Final sync finished");
        }
    }
}
