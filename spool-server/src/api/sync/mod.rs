//! Sync control endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/sync` | Trigger a pass (or join the running one) |
//! | GET | `/api/sync/status` | Last published status snapshot |
//! | POST | `/api/sync/recover` | Requeue permanently failed orders |

mod handler;

use axum::Router;
use axum::routing::{get, post};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/sync", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::trigger_sync))
        .route("/status", get(handler::get_status))
        .route("/recover", post(handler::recover_failed))
}
