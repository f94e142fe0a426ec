//! Sync control handlers

use axum::Json;
use axum::extract::State;
use shared::response::ApiResponse;
use shared::status::{RecoverResponse, StatusSnapshot, SyncTrigger, SyncTriggerResponse};

use crate::core::AppState;
use crate::utils::{AppError, AppResult, ok};

/// POST /api/sync - trigger a sync pass and wait for its report
///
/// Manual triggers ignore the reachability gate and the failure backoff:
/// the attempt itself is the freshest connectivity information there is.
/// If a pass is already running the request joins it.
pub async fn trigger_sync(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<SyncTriggerResponse>>> {
    let handle = state.coordinator.run_sync(SyncTrigger::Manual).await;
    let joined = handle.joined;
    let report = handle
        .wait()
        .await
        .ok_or_else(|| AppError::internal("Sync session ended without a report"))?;

    tracing::info!(
        session = %report.session_id,
        joined,
        attempted = report.attempted(),
        synced = report.synced,
        "Manual sync finished"
    );
    Ok(ok(SyncTriggerResponse { joined, report }))
}

/// GET /api/sync/status - last published status snapshot
///
/// Never blocks on a running pass; this is the read the sync button UI
/// polls.
pub async fn get_status(
    State(state): State<AppState>,
) -> Json<ApiResponse<StatusSnapshot>> {
    ok(state.coordinator.status())
}

/// POST /api/sync/recover - give parked failed orders a fresh set of
/// retries
pub async fn recover_failed(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<RecoverResponse>>> {
    let recovered = state.store.recover_failed()? as u64;
    if recovered > 0 {
        tracing::info!(count = recovered, "Requeued failed orders");
        state.coordinator.refresh_status();
    }
    Ok(ok(RecoverResponse { recovered }))
}
