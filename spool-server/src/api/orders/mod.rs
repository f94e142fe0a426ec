//! Order buffer endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/orders` | Buffer a finalized order |
//! | GET | `/api/orders` | List buffered orders (`?state=` filter) |
//! | GET | `/api/orders/{uid}` | Fetch one buffered order |
//! | DELETE | `/api/orders/{uid}` | Discard a buffered order (idempotent) |

mod handler;

use axum::Router;
use axum::routing::{get, post};

use crate::core::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::buffer_order).get(handler::list_orders))
        .route("/{uid}", get(handler::get_order).delete(handler::discard_order))
}
