/// Backup snapshot endpoint
///
/// # Endpoint
///
/// ```text
/// POST /test-storage
/// ```
///
/// # Response
///
/// ```json
/// {
///   "message": "Backup written to backups/backup_20261019_101500_....json",
///   "backup_created": "backups/backup_20261019_101500_....json",
///   "task_count": 3
/// }
/// ```
///
/// Fails with 500 `storage_unavailable` when storage is not configured or the
/// upload fails, and with 500 `internal_error` when counts cannot be read.

use crate::app::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Backup response
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupResponse {
    pub message: String,

    /// Name of the blob written
    pub backup_created: String,

    pub task_count: i64,
}

pub async fn test_storage(State(state): State<AppState>) -> ApiResult<Json<BackupResponse>> {
    // Report a missing backend before touching the database
    state.backups.ensure_configured()?;

    let stats = state.lifecycle.stats().await?;
    let receipt = state.backups.export(stats).await?;

    Ok(Json(BackupResponse {
        message: format!("Backup written to {}", receipt.blob_name),
        backup_created: receipt.blob_name,
        task_count: receipt.task_count,
    }))
}
