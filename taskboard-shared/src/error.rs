/// Error taxonomy for the persistence and lifecycle layers
///
/// Every store implementation reports failures through [`StoreError`], so
/// callers never see driver-specific error types. The HTTP layer maps each
/// variant to a status code.
///
/// # Mapping from sqlx
///
/// | sqlx failure                              | StoreError              |
/// |-------------------------------------------|-------------------------|
/// | SQLSTATE 23xxx (FK, unique, check, null)  | `ConstraintViolation`   |
/// | SQLSTATE 57014 (statement timeout)        | `DatabaseUnavailable`   |
/// | I/O, TLS, pool timeout/closed, protocol   | `DatabaseUnavailable`   |
/// | anything else                             | `DatabaseUnavailable`   |
///
/// Uploading an attachment touches both the database and the blob store, so
/// that path reports [`AttachError`], which wraps either failure.

use crate::storage::StorageError;
use thiserror::Error;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Typed persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// Missing or malformed required input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// Foreign key, uniqueness or check constraint breach
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Connection or transport failure talking to the database
    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),
}

impl StoreError {
    pub fn task_not_found(id: i32) -> Self {
        StoreError::NotFound { entity: "task", id }
    }

    pub fn category_not_found(id: i32) -> Self {
        StoreError::NotFound { entity: "category", id }
    }

    pub fn attachment_not_found(id: i32) -> Self {
        StoreError::NotFound { entity: "attachment", id }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();

                if code.starts_with("23") {
                    let detail = match db_err.constraint() {
                        Some(constraint) => format!("{} ({})", db_err.message(), constraint),
                        None => db_err.message().to_string(),
                    };
                    return StoreError::ConstraintViolation(detail);
                }

                if code == "57014" {
                    return StoreError::DatabaseUnavailable("statement timed out".to_string());
                }

                StoreError::DatabaseUnavailable(format!("database error {}: {}", code, db_err))
            }
            sqlx::Error::PoolTimedOut => {
                StoreError::DatabaseUnavailable("timed out waiting for a connection".to_string())
            }
            sqlx::Error::PoolClosed => {
                StoreError::DatabaseUnavailable("connection pool is closed".to_string())
            }
            other => StoreError::DatabaseUnavailable(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        StoreError::Validation(errors.to_string())
    }
}

/// Failure storing an attachment
#[derive(Debug, Error)]
pub enum AttachError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<validator::ValidationErrors> for AttachError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AttachError::Store(errors.into())
    }
}
