//! End-to-end flows through the local API: buffer offline, drain on
//! recovery, join a running pass, park and recover rejections.

mod common;

use std::time::Duration;

use common::{spawn_daemon, stub_state, wait_until, StubIngest};
use serde_json::json;
use shared::{SyncState, SyncTrigger};
use spool_client::{ClientConfig, ClientError, SpoolClient};
use spool_server::sync::SyncWorker;
use spool_server::OrderStore;
use tokio_util::sync::CancellationToken;

async fn spawn_client(stub: &StubIngest) -> (SpoolClient, spool_server::AppState) {
    let state = stub_state(stub, OrderStore::open_in_memory().unwrap());
    let url = spawn_daemon(state.clone()).await;
    (SpoolClient::new(&ClientConfig::new(url)), state)
}

#[tokio::test]
async fn test_offline_buffering_then_recovery_drains_fifo() {
    let stub = StubIngest::spawn().await;
    stub.set_up(false);
    let (client, _state) = spawn_client(&stub).await;

    // Terminal keeps taking orders while the link is down
    for n in 1..=3 {
        let buffered = client
            .buffer_order(&format!("order-{n:03}"), json!({"total": n * 100}))
            .await
            .unwrap();
        assert!(buffered.buffered);
        assert_eq!(buffered.pending, n as u64);
    }

    // The pass hits the outage on the first order and stops
    let outcome = client.trigger_sync().await.unwrap();
    assert!(outcome.report.aborted);
    assert_eq!(outcome.report.transient_failures, 1);
    assert_eq!(outcome.report.skipped, 2);
    assert_eq!(stub.received().len(), 0);

    let status = client.status().await.unwrap();
    assert_eq!(status.pending, 3);
    assert!(status.last_error.is_some());

    // Link restored: the backlog drains oldest first
    stub.set_up(true);
    let outcome = client.trigger_sync().await.unwrap();
    assert!(!outcome.report.aborted);
    assert_eq!(outcome.report.synced, 3);
    assert_eq!(outcome.report.trigger, SyncTrigger::Manual);
    assert_eq!(stub.received(), vec!["order-001", "order-002", "order-003"]);

    let status = client.status().await.unwrap();
    assert_eq!(status.pending, 0);
    assert_eq!(status.synced_total, 3);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_duplicate_intake_is_ignored() {
    let stub = StubIngest::spawn().await;
    let (client, _state) = spawn_client(&stub).await;

    let first = client.buffer_order("order-dup", json!({"total": 100})).await.unwrap();
    assert!(first.buffered);

    // Same uid again, e.g. a POS retrying after a dropped response
    let second = client.buffer_order("order-dup", json!({"total": 999})).await.unwrap();
    assert!(!second.buffered);
    assert_eq!(second.pending, 1);

    // First write won
    let order = client.get_order("order-dup").await.unwrap();
    assert_eq!(order.payload["total"], 100);
}

#[tokio::test]
async fn test_blank_uid_is_rejected() {
    let stub = StubIngest::spawn().await;
    let (client, _state) = spawn_client(&stub).await;

    let err = client.buffer_order("   ", json!({})).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let status = client.status().await.unwrap();
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_manual_sync_joins_running_session() {
    let stub = StubIngest::spawn().await;
    stub.set_delay_ms(300);
    let (client, _state) = spawn_client(&stub).await;

    client.buffer_order("order-a", json!({})).await.unwrap();
    client.buffer_order("order-b", json!({})).await.unwrap();

    // Two concurrent triggers; the second lands while the first pass
    // is still submitting and joins it instead of starting another
    let (first, second) = tokio::join!(client.trigger_sync(), client.trigger_sync());
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.report.session_id, second.report.session_id);
    assert_ne!(first.joined, second.joined);
    assert_eq!(first.report.synced, 2);
    assert_eq!(second.report.synced, 2);
    assert_eq!(stub.received().len(), 2);
}

#[tokio::test]
async fn test_permanent_rejection_parks_then_recovers() {
    let stub = StubIngest::spawn().await;
    stub.reject_matching("bad");
    let (client, _state) = spawn_client(&stub).await;

    client.buffer_order("order-1-good", json!({})).await.unwrap();
    client.buffer_order("order-2-bad", json!({})).await.unwrap();
    client.buffer_order("order-3-good", json!({})).await.unwrap();

    // Rejection of the middle order must not block the ones behind it
    let outcome = client.trigger_sync().await.unwrap();
    assert!(!outcome.report.aborted);
    assert_eq!(outcome.report.synced, 2);
    assert_eq!(outcome.report.permanent_failures, 1);
    assert_eq!(stub.received(), vec!["order-1-good", "order-3-good"]);

    let failed = client.list_orders(Some(SyncState::Failed)).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].uid, "order-2-bad");
    assert!(failed[0].last_error.is_some());

    // Rescans leave parked records alone
    let outcome = client.trigger_sync().await.unwrap();
    assert_eq!(outcome.report.attempted(), 0);

    // Operator fixes the upstream complaint and requeues
    stub.accept_all();
    let recovered = client.recover_failed().await.unwrap();
    assert_eq!(recovered.recovered, 1);

    let outcome = client.trigger_sync().await.unwrap();
    assert_eq!(outcome.report.synced, 1);

    let status = client.status().await.unwrap();
    assert_eq!(status.failed, 0);
    assert_eq!(status.synced_total, 3);
}

#[tokio::test]
async fn test_discard_is_idempotent() {
    let stub = StubIngest::spawn().await;
    let (client, _state) = spawn_client(&stub).await;

    client.buffer_order("order-x", json!({})).await.unwrap();

    let first = client.discard_order("order-x").await.unwrap();
    assert!(first.removed);

    let second = client.discard_order("order-x").await.unwrap();
    assert!(!second.removed);

    let err = client.get_order("order-x").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let status = client.status().await.unwrap();
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_reconnect_debounce_runs_one_pass() {
    let stub = StubIngest::spawn().await;
    let state = stub_state(&stub, OrderStore::open_in_memory().unwrap());

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(SyncWorker::new(state.clone(), shutdown.clone()).run());

    // Startup probe sees the stub and marks the link online
    assert!(wait_until(2_000, || state.monitor.is_reachable()).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Outage begins; an order lands while offline
    state.monitor.set_reachable(false);
    state.store.put("order-offline", json!({"total": 42})).unwrap();
    state.intake_signal.send_replace(shared::util::now_millis());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.hit_count(), 0);

    // Flapping link: only the settled transition should sync
    state.monitor.set_reachable(true);
    state.monitor.set_reachable(false);
    state.monitor.set_reachable(true);

    assert!(wait_until(3_000, || state.store.counts().unwrap().pending == 0).await);
    assert_eq!(stub.received(), vec!["order-offline"]);

    // No second pass follows the settled one
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(stub.hit_count(), 1);

    shutdown.cancel();
    worker.await.unwrap();
}
