/// Backup exporter
///
/// Writes a point-in-time JSON snapshot of the aggregate task counts to the
/// configured blob store, one blob per snapshot:
///
/// ```text
/// backups/backup_20261019_101500_5f0c3c8e4b7a4a51a3f2d1c6e9b8a7f6.json
/// ```
///
/// ```json
/// {
///   "timestamp": "2026-10-19T10:15:00Z",
///   "task_count": 3,
///   "pending": 2,
///   "in_progress": 0,
///   "completed": 1,
///   "version": "0.1.0"
/// }
/// ```

use crate::models::TaskStats;
use crate::storage::{BlobStore, StorageError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Snapshot document stored in each backup blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub timestamp: DateTime<Utc>,
    pub task_count: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub version: String,
}

impl BackupSnapshot {
    pub fn new(stats: TaskStats, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            task_count: stats.total,
            pending: stats.pending,
            in_progress: stats.in_progress,
            completed: stats.completed,
            version: crate::VERSION.to_string(),
        }
    }

    /// Blob name for this snapshot; unique per call
    pub fn blob_name(&self) -> String {
        format!(
            "backups/backup_{}_{}.json",
            self.timestamp.format("%Y%m%d_%H%M%S"),
            Uuid::new_v4().simple()
        )
    }
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupReceipt {
    pub blob_name: String,
    pub task_count: i64,
}

/// Writes snapshots when a blob store is configured
#[derive(Clone, Default)]
pub struct BackupExporter {
    blobs: Option<Arc<dyn BlobStore>>,
}

impl BackupExporter {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs: Some(blobs) }
    }

    /// Exporter with no backend; every export reports `NotConfigured`
    pub fn disabled() -> Self {
        Self { blobs: None }
    }

    pub fn is_configured(&self) -> bool {
        self.blobs.is_some()
    }

    /// Describes the backend, or `"disabled"`
    pub fn describe(&self) -> String {
        self.blobs
            .as_ref()
            .map(|b| b.describe())
            .unwrap_or_else(|| "disabled".to_string())
    }

    pub fn ensure_configured(&self) -> Result<&Arc<dyn BlobStore>, StorageError> {
        self.blobs.as_ref().ok_or(StorageError::NotConfigured)
    }

    /// Serializes and uploads a snapshot of `stats`
    pub async fn export(&self, stats: TaskStats) -> Result<BackupReceipt, StorageError> {
        let blobs = self.ensure_configured()?;

        let snapshot = BackupSnapshot::new(stats, Utc::now());
        let blob_name = snapshot.blob_name();
        let body = Bytes::from(serde_json::to_vec_pretty(&snapshot)?);

        blobs.put(&blob_name, "application/json", body).await?;

        info!(
            blob = %blob_name,
            task_count = snapshot.task_count,
            backend = %blobs.describe(),
            "Backup snapshot written"
        );

        Ok(BackupReceipt {
            blob_name,
            task_count: snapshot.task_count,
        })
    }
}
