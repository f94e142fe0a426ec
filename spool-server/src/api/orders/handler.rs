//! Order buffer handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use shared::order::{BufferOrderRequest, BufferOrderResponse, PendingOrder, SyncState};
use shared::response::ApiResponse;
use shared::status::DiscardResponse;
use shared::util::now_millis;

use crate::core::AppState;
use crate::utils::{AppError, AppResult, ok};

/// POST /api/orders - buffer a finalized order
///
/// Returns synchronously once the record is durable; whether the upstream
/// is reachable never changes the answer. Buffering the same uid twice is
/// a no-op (the first write wins).
pub async fn buffer_order(
    State(state): State<AppState>,
    Json(request): Json<BufferOrderRequest>,
) -> AppResult<Json<ApiResponse<BufferOrderResponse>>> {
    if request.uid.trim().is_empty() {
        return Err(AppError::validation("Order uid must not be empty"));
    }

    let buffered = state.store.put(&request.uid, request.payload)?;
    if buffered {
        tracing::debug!(uid = %request.uid, "Order buffered");
        // Wake the worker for a prompt drain while online
        state.intake_signal.send_replace(now_millis());
    } else {
        tracing::debug!(uid = %request.uid, "Duplicate order uid ignored");
    }
    state.coordinator.refresh_status();

    let pending = state.store.counts()?.pending;
    Ok(ok(BufferOrderResponse { uid: request.uid, buffered, pending }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Optional state filter: PENDING | IN_FLIGHT | SYNCED | FAILED
    pub state: Option<SyncState>,
}

/// GET /api/orders - list buffered orders oldest first
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<PendingOrder>>>> {
    let orders = state.store.list(query.state)?;
    Ok(ok(orders))
}

/// GET /api/orders/{uid} - fetch one buffered order
pub async fn get_order(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<ApiResponse<PendingOrder>>> {
    let order = state
        .store
        .get(&uid)?
        .ok_or_else(|| AppError::not_found(format!("Order {uid} not buffered")))?;
    Ok(ok(order))
}

/// DELETE /api/orders/{uid} - discard a buffered order
///
/// Idempotent: discarding an unknown uid reports `removed: false` instead
/// of failing.
pub async fn discard_order(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<ApiResponse<DiscardResponse>>> {
    let removed = state.store.remove(&uid)?;
    if removed {
        tracing::info!(uid = %uid, "Order discarded");
        state.coordinator.refresh_status();
    }
    Ok(ok(DiscardResponse { uid, removed }))
}
