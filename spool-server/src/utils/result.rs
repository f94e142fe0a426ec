//! Result alias used throughout the server

use super::error::AppError;

/// Result type for handlers and fallible service calls
pub type AppResult<T> = Result<T, AppError>;
