//! Health check endpoints
//!
//! `GET /health` answers cheaply for liveness probes;
//! `GET /health/detailed` times a buffer read and reports upstream
//! reachability.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::core::AppState;

static START_TIME: OnceLock<SystemTime> = OnceLock::new();

/// Record the process start; called once from main
pub fn mark_started() {
    START_TIME.get_or_init(SystemTime::now);
}

fn uptime_seconds() -> u64 {
    START_TIME
        .get()
        .and_then(|start| start.elapsed().ok())
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    online: bool,
    pending: u64,
    uptime_seconds: u64,
}

#[derive(Serialize)]
struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    checks: HealthChecks,
}

#[derive(Serialize)]
struct HealthChecks {
    store: CheckResult,
    upstream: CheckResult,
}

#[derive(Serialize)]
struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CheckResult {
    fn ok() -> Self {
        Self { status: "ok", latency_ms: None, message: None }
    }

    fn ok_with_latency(latency_ms: u64) -> Self {
        Self { status: "ok", latency_ms: Some(latency_ms), message: None }
    }

    fn error(message: impl Into<String>) -> Self {
        Self { status: "error", latency_ms: None, message: Some(message.into()) }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending = state.store.counts().map(|c| c.pending).unwrap_or(0);
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        online: state.monitor.is_reachable(),
        pending,
        uptime_seconds: uptime_seconds(),
    })
}

async fn detailed_health(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let store = match state.store.counts() {
        Ok(_) => CheckResult::ok_with_latency(started.elapsed().as_millis() as u64),
        Err(e) => CheckResult::error(e.to_string()),
    };

    let upstream = if state.monitor.is_reachable() {
        CheckResult::ok()
    } else {
        CheckResult::error("ingestion endpoint unreachable")
    };

    // The daemon is healthy while it can buffer; an offline upstream is
    // the situation it exists for, not a failure
    let status = if store.status == "ok" { "healthy" } else { "degraded" };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime_seconds(),
        checks: HealthChecks { store, upstream },
    })
}
