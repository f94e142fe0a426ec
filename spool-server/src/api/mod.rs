//! HTTP API surface
//!
//! | Module | Routes |
//! |--------|--------|
//! | [`orders`] | intake, listing, discard |
//! | [`sync`] | manual trigger, status, recover |
//! | [`health`] | liveness and component checks |

pub mod health;
pub mod orders;
pub mod sync;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::AppState;

/// All routes, no middleware or state applied
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(orders::router())
        .merge(sync::router())
        .merge(health::router())
}

/// Fully configured application: routes, CORS, request tracing, state
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
