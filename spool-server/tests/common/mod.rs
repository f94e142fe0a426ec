#![allow(dead_code)]

//! Shared fixtures: a scriptable stub ingestion service and daemon wiring

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use spool_server::core::{AppState, Config};
use spool_server::sync::{HttpSubmitter, OrderSubmitter};
use spool_server::OrderStore;

/// In-process stand-in for the upstream ingestion service.
///
/// Starts accepting; flip `set_up(false)` for an outage, or script
/// rejections with `reject_matching`.
#[derive(Clone)]
pub struct StubIngest {
    pub url: String,
    up: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicUsize>,
    reject_needle: Arc<Mutex<Option<String>>>,
    delay_ms: Arc<AtomicU64>,
}

impl StubIngest {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stub = Self {
            url: format!("http://{addr}"),
            up: Arc::new(AtomicBool::new(true)),
            received: Arc::new(Mutex::new(Vec::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            reject_needle: Arc::new(Mutex::new(None)),
            delay_ms: Arc::new(AtomicU64::new(0)),
        };

        let app = Router::new()
            .route("/api/orders/ingest", post(ingest))
            .route("/health", get(health))
            .with_state(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        stub
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn reject_matching(&self, needle: &str) {
        *self.reject_needle.lock().unwrap() = Some(needle.to_string());
    }

    pub fn accept_all(&self) {
        *self.reject_needle.lock().unwrap() = None;
    }

    pub fn set_delay_ms(&self, delay: u64) {
        self.delay_ms.store(delay, Ordering::SeqCst);
    }

    /// Uids accepted so far, in arrival order
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Ingest requests seen, accepted or not (health probes not counted)
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn ingest(
    State(stub): State<StubIngest>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    stub.hits.fetch_add(1, Ordering::SeqCst);

    let delay = stub.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !stub.up.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let uid = body["uid"].as_str().unwrap_or_default().to_string();
    let rejected = stub
        .reject_needle
        .lock()
        .unwrap()
        .as_deref()
        .is_some_and(|needle| uid.contains(needle));
    if rejected {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    stub.received.lock().unwrap().push(uid);
    StatusCode::OK
}

async fn health(State(stub): State<StubIngest>) -> StatusCode {
    if stub.up.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Config tuned for tests: no pacing, short backoff and debounce, and a
/// prober interval long enough to never fire mid-test
pub fn test_config(ingest_url: &str) -> Config {
    let mut config = Config::with_overrides("/tmp/spool-test", 0, ingest_url);
    config.submit_pacing_ms = 0;
    config.backoff_base_ms = 50;
    config.backoff_max_ms = 200;
    config.online_debounce_ms = 150;
    config.probe_interval_secs = 3600;
    config.ingest_timeout_ms = 2_000;
    config.probe_timeout_ms = 500;
    config
}

/// App state wired to the stub with a real HTTP submitter
pub fn stub_state(stub: &StubIngest, store: OrderStore) -> AppState {
    let config = test_config(&stub.url);
    let submitter: Arc<dyn OrderSubmitter> = Arc::new(
        HttpSubmitter::new(
            stub.url.clone(),
            Duration::from_millis(config.ingest_timeout_ms),
            Duration::from_millis(config.probe_timeout_ms),
        )
        .unwrap(),
    );
    AppState::assemble(config, store, submitter)
}

/// Serve the daemon API on an ephemeral port, returning its base URL
pub async fn spawn_daemon(state: AppState) -> String {
    let app = spool_server::api::build_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Poll `condition` until it holds or `timeout_ms` elapses
pub async fn wait_until<F: Fn() -> bool>(timeout_ms: u64, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
