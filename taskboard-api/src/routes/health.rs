/// Health check endpoint
///
/// Liveness check that also reports whether the database answers. It always
/// responds 200; a database outage shows up as `"status": "degraded"`.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "message": "Application is running",
///   "timestamp": "2026-10-19T10:15:00Z",
///   "version": "0.1.0",
///   "database": "connected"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,

    pub message: String,

    pub timestamp: DateTime<Utc>,

    /// Application version
    pub version: String,

    /// "connected" or "disconnected"
    pub database: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match state.store().ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                backend = state.store().backend(),
                error = %err,
                "Health check: database unreachable"
            );
            false
        }
    };

    let (status, message, database) = if connected {
        ("healthy", "Application is running", "connected")
    } else {
        (
            "degraded",
            "Application is running without its database",
            "disconnected",
        )
    };

    Json(HealthResponse {
        status: status.to_string(),
        message: message.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    })
}
