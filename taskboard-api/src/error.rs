/// Error handling for the API server
///
/// Handlers return `Result<T, ApiError>`; the error converts itself into a
/// status code and a JSON body of the form `{"error": code, "message": text}`.
///
/// # Example
///
/// ```no_run
/// use taskboard_api::error::ApiResult;
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskboard_shared::error::{AttachError, StoreError};
use taskboard_shared::storage::StorageError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400): missing or malformed input, constraint breach
    BadRequest(String),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500); detail is logged, never returned
    InternalError(String),

    /// Blob storage failure on the backup or upload path (500)
    StorageUnavailable(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) | ApiError::StorageUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg),
            ApiError::NotFound(msg) => ("not_found", msg),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("internal_error", "An internal error occurred".to_string())
            }
            ApiError::StorageUnavailable(msg) => {
                tracing::error!("Blob storage failed: {}", msg);
                ("storage_unavailable", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Convert persistence errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            StoreError::ConstraintViolation(msg) => ApiError::BadRequest(msg),
            err @ StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::DatabaseUnavailable(msg) => {
                ApiError::InternalError(format!("Database error: {}", msg))
            }
        }
    }
}

/// Convert blob storage errors to API errors
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::StorageUnavailable(err.to_string())
    }
}

impl From<AttachError> for ApiError {
    fn from(err: AttachError) -> Self {
        match err {
            AttachError::Store(err) => err.into(),
            AttachError::Storage(err) => err.into(),
        }
    }
}
