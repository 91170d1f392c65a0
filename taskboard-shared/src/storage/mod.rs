/// Blob storage and backup snapshots
///
/// - `blob`: the [`BlobStore`] trait, an Azure Blob Storage client signed with
///   Shared Key, and an in-memory store
/// - `backup`: the [`BackupExporter`] that writes task-count snapshots
///
/// Storage is optional. Without credentials the exporter reports
/// [`StorageError::NotConfigured`] and the rest of the system is unaffected.

pub mod backup;
pub mod blob;

pub use backup::{BackupExporter, BackupReceipt, BackupSnapshot};
pub use blob::{AzureBlobStore, AzureStorageConfig, BlobStore, MemoryBlobStore};

use thiserror::Error;

/// Blob storage failure
#[derive(Debug, Error)]
pub enum StorageError {
    /// No storage credentials were configured
    #[error("Blob storage is not configured")]
    NotConfigured,

    /// Account key or other credential could not be used
    #[error("Invalid storage credentials: {0}")]
    InvalidCredentials(String),

    /// Transport failure reaching the storage service
    #[error("Blob storage unavailable: {0}")]
    Unavailable(String),

    /// Service answered with a non-success status
    #[error("Blob storage rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Snapshot document could not be produced
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}
