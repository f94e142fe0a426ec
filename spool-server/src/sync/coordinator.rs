//! Sync coordinator: single-flight drain of the order buffer
//!
//! One pass claims everything eligible in a single transaction, then
//! submits oldest first. Outcomes drive the record transitions:
//!
//! * accepted - removed from the buffer, synced counter bumped
//! * permanent rejection - parked as failed, pass moves on
//! * transient failure - retry bookkeeping, pass aborts and releases the
//!   rest of its claim (the link is presumed down; submitting younger
//!   orders past the failure would reorder the stream)
//!
//! `run_sync` is single-flight: while a pass is running, further calls
//! join the active session and share its report instead of starting a
//! second pass. After every transition a fresh status snapshot goes out
//! on a watch channel, so status reads never touch the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use shared::order::PendingOrder;
use shared::status::{OrderOutcome, StatusSnapshot, SyncOutcome, SyncReport, SyncTrigger};
use shared::util::now_millis;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use uuid::Uuid;

use crate::buffer::{OrderStore, StoreError};
use crate::connectivity::ConnectivityMonitor;
use crate::core::Config;
use crate::sync::backoff::Backoff;
use crate::sync::submitter::{OrderSubmitter, SubmitError};

/// Handle onto a sync session, either freshly started or joined
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: String,
    /// True when this handle joined a pass that was already running
    pub joined: bool,
    report_rx: watch::Receiver<Option<SyncReport>>,
}

impl SessionHandle {
    /// Wait for the pass to finish and return its report.
    ///
    /// `None` means the session task died without reporting, which only
    /// happens if the runtime is tearing down.
    pub async fn wait(mut self) -> Option<SyncReport> {
        loop {
            if let Some(report) = self.report_rx.borrow_and_update().as_ref() {
                return Some(report.clone());
            }
            if self.report_rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

struct ActiveSession {
    session_id: String,
    report_rx: watch::Receiver<Option<SyncReport>>,
}

/// Owns the sync pass lifecycle and the published status
pub struct SyncCoordinator {
    store: OrderStore,
    submitter: Arc<dyn OrderSubmitter>,
    monitor: ConnectivityMonitor,
    config: Config,
    backoff: Backoff,
    active: Mutex<Option<ActiveSession>>,
    status_tx: watch::Sender<StatusSnapshot>,
    /// Consecutive passes that ended in a transient failure
    transient_streak: AtomicU32,
    /// Scheduled passes hold off until this time (epoch millis)
    backoff_until_ms: AtomicI64,
}

impl SyncCoordinator {
    pub fn new(
        store: OrderStore,
        submitter: Arc<dyn OrderSubmitter>,
        monitor: ConnectivityMonitor,
        config: Config,
    ) -> Self {
        let (status_tx, _) = watch::channel(StatusSnapshot::default());
        let backoff = config.backoff();
        let coordinator = Self {
            store,
            submitter,
            monitor,
            config,
            backoff,
            active: Mutex::new(None),
            status_tx,
            transient_streak: AtomicU32::new(0),
            backoff_until_ms: AtomicI64::new(0),
        };
        coordinator.refresh_status();
        coordinator
    }

    // ========== Status ==========

    /// Last published snapshot with live reachability merged in
    pub fn status(&self) -> StatusSnapshot {
        let mut snapshot = self.status_tx.borrow().clone();
        snapshot.online = self.monitor.is_reachable();
        snapshot
    }

    /// Subscribe to snapshot updates
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    /// Recompute buffer counts and republish the snapshot.
    ///
    /// Called after every record transition; also by the intake path so
    /// freshly buffered orders show up immediately.
    pub fn refresh_status(&self) {
        let counts = match self.store.counts() {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read buffer counts for status");
                return;
            }
        };
        let synced_total = match self.store.synced_total() {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read synced counter for status");
                return;
            }
        };
        let backoff_until = self.backoff_until_ms.load(Ordering::Relaxed);
        let online = self.monitor.is_reachable();

        self.status_tx.send_modify(|status| {
            status.pending = counts.pending;
            status.in_flight = counts.in_flight;
            status.failed = counts.failed;
            status.synced_total = synced_total;
            status.online = online;
            status.next_retry_at = (backoff_until > now_millis()).then_some(backoff_until);
        });
    }

    // ========== Backoff Gate ==========

    /// Whether scheduled passes should hold off right now.
    ///
    /// Manual triggers ignore this; it only paces the automatic ones.
    pub fn in_backoff(&self, now: i64) -> bool {
        now < self.backoff_until_ms.load(Ordering::Relaxed)
    }

    /// Clear the failure streak, e.g. when connectivity is regained
    pub fn reset_backoff(&self) {
        self.transient_streak.store(0, Ordering::Relaxed);
        self.backoff_until_ms.store(0, Ordering::Relaxed);
    }

    fn note_transient_pass(&self) {
        let streak = self.transient_streak.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.backoff.delay(streak);
        let until = now_millis() + delay.as_millis() as i64;
        self.backoff_until_ms.store(until, Ordering::Relaxed);
        tracing::info!(
            streak,
            retry_in_secs = delay.as_secs(),
            "Backing off scheduled sync after transient failure"
        );
    }

    // ========== Sync Sessions ==========

    /// Start a sync pass, or join the one already running.
    ///
    /// The pass itself runs on its own task; the returned handle can be
    /// awaited for the report or dropped without affecting the pass.
    pub async fn run_sync(self: &Arc<Self>, trigger: SyncTrigger) -> SessionHandle {
        let mut active = self.active.lock().await;

        if let Some(session) = active.as_ref() {
            // Unfinished session: join it instead of starting another
            if session.report_rx.borrow().is_none() {
                tracing::debug!(
                    session = %session.session_id,
                    trigger = ?trigger,
                    "Joining active sync session"
                );
                return SessionHandle {
                    session_id: session.session_id.clone(),
                    joined: true,
                    report_rx: session.report_rx.clone(),
                };
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let (report_tx, report_rx) = watch::channel(None);
        *active = Some(ActiveSession {
            session_id: session_id.clone(),
            report_rx: report_rx.clone(),
        });
        drop(active);

        let coordinator = self.clone();
        let task_session_id = session_id.clone();
        tokio::spawn(async move {
            let report = coordinator.run_pass(&task_session_id, trigger).await;
            // Clear the slot first so late joiners start a fresh session
            // rather than attaching to a finished one
            *coordinator.active.lock().await = None;
            let _ = report_tx.send(Some(report));
        });

        SessionHandle { session_id, joined: false, report_rx }
    }

    /// One complete sync pass over the claimed backlog
    async fn run_pass(&self, session_id: &str, trigger: SyncTrigger) -> SyncReport {
        let started_at = now_millis();
        tracing::info!(session = %session_id, trigger = ?trigger, "Sync pass started");
        self.status_tx.send_modify(|status| {
            status.sync_active = true;
            status.last_sync_started_at = Some(started_at);
        });

        let mut outcomes: Vec<OrderOutcome> = Vec::new();
        let mut aborted = false;
        let mut had_transient = false;

        let claimed = match self.store.claim_pending(self.config.retry_ceiling) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(session = %session_id, error = %e, "Failed to claim backlog");
                aborted = true;
                Vec::new()
            }
        };

        if !claimed.is_empty() {
            tracing::info!(session = %session_id, count = claimed.len(), "Claimed orders");
            self.refresh_status();
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.session_budget_ms);
        let mut queue = claimed.into_iter().peekable();

        while let Some(order) = queue.next() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    session = %session_id,
                    "Session budget exhausted, deferring the rest of the claim"
                );
                self.defer_remaining(Some(order), &mut queue, &mut outcomes);
                aborted = true;
                break;
            }

            match self.submitter.submit(&order).await {
                Ok(()) => self.on_synced(&order, &mut outcomes),
                Err(SubmitError::Permanent(reason)) => {
                    self.on_rejected(&order, reason, &mut outcomes);
                }
                Err(SubmitError::Transient(reason)) => {
                    self.on_transient(&order, reason, &mut outcomes);
                    had_transient = true;
                    aborted = true;
                    self.defer_remaining(None, &mut queue, &mut outcomes);
                    break;
                }
            }

            if queue.peek().is_some() && self.config.submit_pacing_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.submit_pacing_ms)).await;
            }
        }

        if had_transient {
            self.note_transient_pass();
        }

        let finished_at = now_millis();
        let report = SyncReport::from_outcomes(
            session_id.to_string(),
            trigger,
            started_at,
            finished_at,
            outcomes,
            aborted,
        );

        if report.attempted() > 0 && report.transient_failures == 0 {
            self.reset_backoff();
        }

        self.status_tx.send_modify(|status| {
            status.sync_active = false;
            status.last_sync_finished_at = Some(finished_at);
            if report.attempted() > 0
                && report.transient_failures == 0
                && report.permanent_failures == 0
            {
                status.last_error = None;
            }
        });
        self.refresh_status();

        tracing::info!(
            session = %session_id,
            synced = report.synced,
            transient = report.transient_failures,
            permanent = report.permanent_failures,
            skipped = report.skipped,
            "Sync pass finished"
        );
        report
    }

    // ========== Per-order Outcomes ==========

    fn on_synced(&self, order: &PendingOrder, outcomes: &mut Vec<OrderOutcome>) {
        match self.store.complete(&order.uid) {
            Ok(()) => {}
            Err(StoreError::OrderNotFound(_)) => {
                // Discarded while in flight; the submission already
                // happened, so count it and move on
                tracing::error!(uid = %order.uid, "Synced order vanished from the buffer");
            }
            Err(e) => {
                // Leave the record in flight; startup recovery or the next
                // pass release returns it to pending, and the uid keeps the
                // resubmission idempotent upstream
                tracing::error!(uid = %order.uid, error = %e, "Failed to finalize synced order");
            }
        }
        tracing::info!(uid = %order.uid, "Order synced");
        outcomes.push(OrderOutcome {
            uid: order.uid.clone(),
            outcome: SyncOutcome::Synced,
            error: None,
        });
        self.refresh_status();
    }

    fn on_rejected(&self, order: &PendingOrder, reason: String, outcomes: &mut Vec<OrderOutcome>) {
        tracing::warn!(uid = %order.uid, reason = %reason, "Order rejected, parking as failed");
        if let Err(e) = self.store.mark_rejected(&order.uid, &reason, self.config.retry_ceiling) {
            tracing::error!(uid = %order.uid, error = %e, "Failed to park rejected order");
        }
        self.status_tx.send_modify(|status| status.last_error = Some(reason.clone()));
        outcomes.push(OrderOutcome {
            uid: order.uid.clone(),
            outcome: SyncOutcome::PermanentFailure,
            error: Some(reason),
        });
        self.refresh_status();
    }

    fn on_transient(&self, order: &PendingOrder, reason: String, outcomes: &mut Vec<OrderOutcome>) {
        let attempts = order.retry_count + 1;
        if attempts >= self.config.retry_ceiling {
            tracing::warn!(
                uid = %order.uid,
                attempts,
                reason = %reason,
                "Retry ceiling reached, parking order as failed"
            );
            if let Err(e) = self.store.mark_failed(&order.uid, &reason) {
                tracing::error!(uid = %order.uid, error = %e, "Failed to park exhausted order");
            }
        } else {
            tracing::warn!(
                uid = %order.uid,
                attempts,
                reason = %reason,
                "Transient submission failure, will retry"
            );
            if let Err(e) = self.store.mark_retry(&order.uid, &reason) {
                tracing::error!(uid = %order.uid, error = %e, "Failed to record retry");
            }
        }
        self.status_tx.send_modify(|status| status.last_error = Some(reason.clone()));
        outcomes.push(OrderOutcome {
            uid: order.uid.clone(),
            outcome: SyncOutcome::TransientFailure,
            error: Some(reason),
        });
        self.refresh_status();
    }

    /// Release claimed but unattempted records back to pending
    fn defer_remaining(
        &self,
        first: Option<PendingOrder>,
        queue: &mut std::iter::Peekable<std::vec::IntoIter<PendingOrder>>,
        outcomes: &mut Vec<OrderOutcome>,
    ) {
        let rest: Vec<PendingOrder> = first.into_iter().chain(queue.by_ref()).collect();
        if rest.is_empty() {
            return;
        }
        let uids: Vec<String> = rest.iter().map(|o| o.uid.clone()).collect();
        if let Err(e) = self.store.release_claimed(&uids) {
            tracing::error!(error = %e, "Failed to release deferred orders");
        }
        for order in rest {
            outcomes.push(OrderOutcome {
                uid: order.uid,
                outcome: SyncOutcome::Skipped,
                error: None,
            });
        }
        self.refresh_status();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    enum Script {
        Ok,
        Transient,
        RejectMatching(&'static str),
    }

    struct ScriptedSubmitter {
        script: Script,
        submitted: std::sync::Mutex<Vec<String>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedSubmitter {
        fn new(script: Script) -> Self {
            Self { script, submitted: std::sync::Mutex::new(Vec::new()), gate: None }
        }

        fn gated(script: Script, gate: Arc<Semaphore>) -> Self {
            Self { script, submitted: std::sync::Mutex::new(Vec::new()), gate: Some(gate) }
        }

        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderSubmitter for ScriptedSubmitter {
        async fn submit(&self, order: &PendingOrder) -> Result<(), SubmitError> {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            self.submitted.lock().unwrap().push(order.uid.clone());
            match &self.script {
                Script::Ok => Ok(()),
                Script::Transient => Err(SubmitError::Transient("connection refused".into())),
                Script::RejectMatching(needle) => {
                    if order.uid.contains(needle) {
                        Err(SubmitError::Permanent("unknown product".into()))
                    } else {
                        Ok(())
                    }
                }
            }
        }

        async fn ping(&self) -> bool {
            true
        }
    }

    fn test_config() -> Config {
        let mut config = Config::with_overrides("/tmp/unused", 0, "http://unused");
        config.submit_pacing_ms = 0;
        config.backoff_base_ms = 50;
        config.backoff_max_ms = 200;
        config
    }

    fn setup(script: Script) -> (Arc<SyncCoordinator>, Arc<ScriptedSubmitter>, OrderStore) {
        setup_with_config(script, test_config())
    }

    fn setup_with_config(
        script: Script,
        config: Config,
    ) -> (Arc<SyncCoordinator>, Arc<ScriptedSubmitter>, OrderStore) {
        let store = OrderStore::open_in_memory().unwrap();
        let submitter = Arc::new(ScriptedSubmitter::new(script));
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            submitter.clone(),
            ConnectivityMonitor::new(),
            config,
        ));
        (coordinator, submitter, store)
    }

    fn order_at(uid: &str, created_at: i64) -> PendingOrder {
        let mut order = PendingOrder::new(uid, serde_json::json!({"uid": uid}));
        order.created_at = created_at;
        order
    }

    #[tokio::test]
    async fn test_pass_submits_oldest_first() {
        let (coordinator, submitter, store) = setup(Script::Ok);
        // Insertion order disagrees with creation order
        store.put_record(&order_at("1", 10)).unwrap();
        store.put_record(&order_at("2", 5)).unwrap();

        let report = coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        assert_eq!(report.synced, 2);
        assert!(!report.aborted);
        assert_eq!(submitter.submitted(), vec!["2", "1"]);
        assert!(store.list(None).unwrap().is_empty());
        assert_eq!(store.synced_total().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_single_flight_joins_active_session() {
        let gate = Arc::new(Semaphore::new(0));
        let store = OrderStore::open_in_memory().unwrap();
        let submitter =
            Arc::new(ScriptedSubmitter::gated(Script::Ok, gate.clone()));
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            submitter.clone(),
            ConnectivityMonitor::new(),
            test_config(),
        ));
        store.put("order-1", serde_json::json!({})).unwrap();

        let first = coordinator.run_sync(SyncTrigger::Manual).await;
        // The pass is parked on the gate; this must join, not restart
        let second = coordinator.run_sync(SyncTrigger::Rescan).await;
        assert!(!first.joined);
        assert!(second.joined);
        assert_eq!(first.session_id, second.session_id);

        gate.add_permits(8);
        let report_a = first.wait().await.unwrap();
        let report_b = second.wait().await.unwrap();
        assert_eq!(report_a, report_b);
        assert_eq!(report_a.synced, 1);

        // With the session finished, the next trigger starts fresh
        let third = coordinator.run_sync(SyncTrigger::Manual).await;
        assert!(!third.joined);
        assert_ne!(third.session_id, report_a.session_id);
    }

    #[tokio::test]
    async fn test_retry_ceiling_parks_order_with_count() {
        let (coordinator, submitter, store) = setup(Script::Transient);
        store.put("order-1", serde_json::json!({})).unwrap();

        for _ in 0..3 {
            coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();
        }

        let order = store.get("order-1").unwrap().unwrap();
        assert_eq!(order.state, shared::order::SyncState::Failed);
        assert_eq!(order.retry_count, 3);
        assert_eq!(order.last_error.as_deref(), Some("connection refused"));

        // Parked means parked: a fourth pass must not touch it
        let report = coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();
        assert_eq!(report.attempted(), 0);
        assert_eq!(submitter.submitted().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_rejection_does_not_stop_the_pass() {
        let (coordinator, submitter, store) = setup(Script::RejectMatching("bad"));
        store.put_record(&order_at("good-1", 1)).unwrap();
        store.put_record(&order_at("bad-2", 2)).unwrap();
        store.put_record(&order_at("good-3", 3)).unwrap();

        let report = coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        assert_eq!(report.synced, 2);
        assert_eq!(report.permanent_failures, 1);
        assert_eq!(report.skipped, 0);
        assert!(!report.aborted);
        assert_eq!(submitter.submitted(), vec!["good-1", "bad-2", "good-3"]);

        let parked = store.get("bad-2").unwrap().unwrap();
        assert_eq!(parked.state, shared::order::SyncState::Failed);
        // Saturated so no later pass claims it
        assert_eq!(parked.retry_count, 3);
    }

    #[tokio::test]
    async fn test_transient_failure_aborts_and_releases() {
        let (coordinator, submitter, store) = setup(Script::Transient);
        store.put_record(&order_at("a", 1)).unwrap();
        store.put_record(&order_at("b", 2)).unwrap();
        store.put_record(&order_at("c", 3)).unwrap();

        let report = coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        assert!(report.aborted);
        assert_eq!(report.transient_failures, 1);
        assert_eq!(report.skipped, 2);
        // Only the head was attempted
        assert_eq!(submitter.submitted(), vec!["a"]);

        // Unattempted records come back untouched
        let b = store.get("b").unwrap().unwrap();
        assert_eq!(b.state, shared::order::SyncState::Pending);
        assert_eq!(b.retry_count, 0);
        assert_eq!(store.get("a").unwrap().unwrap().retry_count, 1);
        assert_eq!(store.counts().unwrap().in_flight, 0);
    }

    #[tokio::test]
    async fn test_exhausted_budget_defers_the_claim() {
        let mut config = test_config();
        config.session_budget_ms = 0;
        let (coordinator, submitter, store) = setup_with_config(Script::Ok, config);
        store.put("a", serde_json::json!({})).unwrap();
        store.put("b", serde_json::json!({})).unwrap();

        let report = coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        assert!(report.aborted);
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.skipped, 2);
        assert!(submitter.submitted().is_empty());
        assert_eq!(store.counts().unwrap().pending, 2);
    }

    #[tokio::test]
    async fn test_backoff_gate_follows_failed_passes() {
        let (coordinator, _, store) = setup(Script::Transient);
        store.put("order-1", serde_json::json!({})).unwrap();

        assert!(!coordinator.in_backoff(now_millis()));
        coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        assert!(coordinator.in_backoff(now_millis()));
        assert!(coordinator.status().next_retry_at.is_some());

        // Regained connectivity clears the gate
        coordinator.reset_backoff();
        assert!(!coordinator.in_backoff(now_millis()));
    }

    #[tokio::test]
    async fn test_status_snapshot_after_clean_pass() {
        let (coordinator, _, store) = setup(Script::Ok);
        store.put("order-1", serde_json::json!({})).unwrap();
        assert_eq!(coordinator.status().pending, 1);

        coordinator.run_sync(SyncTrigger::Manual).await.wait().await.unwrap();

        let status = coordinator.status();
        assert_eq!(status.pending, 0);
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.synced_total, 1);
        assert!(!status.sync_active);
        assert!(status.last_sync_started_at.is_some());
        assert!(status.last_sync_finished_at.is_some());
        assert!(status.last_error.is_none());
    }
}
