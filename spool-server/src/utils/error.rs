//! Application error type and HTTP response mapping
//!
//! Every handler returns `AppResult<T>`; failures are mapped onto the
//! common response envelope with a stable error code.
//!
//! | Code  | Meaning            | HTTP status |
//! |-------|--------------------|-------------|
//! | E0000 | success            | 200         |
//! | E0002 | validation failed  | 400         |
//! | E0003 | resource not found | 404         |
//! | E9001 | internal error     | 500         |
//! | E9002 | storage error      | 500         |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use shared::response::ApiResponse;
use tracing::error;

use crate::buffer::StoreError;

/// Application-level error
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Client Errors ==========
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // ========== Server Errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(uid) => Self::NotFound(format!("Order {uid} not buffered")),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.clone()),
            AppError::Storage(msg) => {
                error!(target: "storage", error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9002", msg.clone())
            }
            AppError::Internal(msg) => {
                error!(target: "server", error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9001", msg.clone())
            }
        };

        (status, Json(ApiResponse::<()>::error(code, message))).into_response()
    }
}

/// Wrap a payload in the success envelope
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}

/// Wrap a payload in the success envelope with a custom message
pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok_with_message(data, message))
}
