//! Unified API response envelope
//!
//! Every endpoint on the daemon's local API answers with the same shape:
//!
//! ```json
//! {
//!   "code": "E0000",
//!   "message": "success",
//!   "data": { ... }
//! }
//! ```
//!
//! `code` is `E0000` on success; error codes are assigned by the server's
//! error layer.

use serde::{Deserialize, Serialize};

/// Code used for successful responses
pub const API_CODE_SUCCESS: &str = "E0000";

/// Response envelope carried by every API endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Machine-readable result code ("E0000" = success)
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Payload, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(data: T) -> Self {
        Self {
            code: API_CODE_SUCCESS.to_string(),
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Successful response with a custom message
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: API_CODE_SUCCESS.to_string(),
            message: message.into(),
            data: Some(data),
        }
    }

    /// Error response with a code and message, no payload
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Whether this response carries the success code
    pub fn is_success(&self) -> bool {
        self.code == API_CODE_SUCCESS
    }
}
