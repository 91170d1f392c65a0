/// Persistence access layer
///
/// [`TaskStore`] is the contract the lifecycle manager and the HTTP layer talk
/// to. Implementations:
///
/// - [`postgres::PgStore`]: production store over a lazily-connected `PgPool`,
///   bootstrapping the schema on first use
/// - [`memory::MemoryStore`]: in-process store with the same semantics, used by
///   tests and local runs without a database
///
/// All failures are reported as [`StoreError`]; nothing driver-specific leaks.
///
/// # Contract
///
/// - `list_tasks` returns tasks newest-created first (ties broken by id, descending)
/// - `advance_status` only updates when the current status is in `from`, and
///   refreshes `updated_at`
/// - `create_category` never modifies an existing row with the same name
/// - `create_task` with an unknown `category_id` fails with `ConstraintViolation`
/// - `delete_category` fails with `ConstraintViolation` while tasks reference it
/// - `create_attachment` for an unknown task fails with `ConstraintViolation`
/// - `delete_task` removes the task's attachment rows in the same step and
///   hands them back, so the caller can drop the blobs
/// - every task read carries its attachments, oldest first

pub mod memory;
pub mod postgres;

use crate::error::StoreResult;
use crate::models::{
    Attachment, Category, NewAttachment, NewCategory, NewTask, Task, TaskStats, TaskStatus,
};
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Ensures tables and seed data exist
    async fn ensure_schema(&self) -> StoreResult<()>;

    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;

    async fn create_task(&self, data: &NewTask) -> StoreResult<Task>;

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>>;

    async fn list_tasks(&self) -> StoreResult<Vec<Task>>;

    /// Moves a task to `to` if its current status is in `from`
    async fn advance_status(
        &self,
        id: i32,
        to: TaskStatus,
        from: &[TaskStatus],
    ) -> StoreResult<Option<Task>>;

    /// Hard-deletes a task and its attachment rows
    ///
    /// Returns the removed attachments, or `None` when there is no such task.
    async fn delete_task(&self, id: i32) -> StoreResult<Option<Vec<Attachment>>>;

    async fn task_stats(&self) -> StoreResult<TaskStats>;

    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Inserts unless the name exists; returns the row and whether it was inserted
    async fn create_category(&self, data: &NewCategory) -> StoreResult<(Category, bool)>;

    async fn delete_category(&self, id: i32) -> StoreResult<bool>;

    async fn create_attachment(&self, data: &NewAttachment) -> StoreResult<Attachment>;

    async fn find_attachment(&self, id: i32) -> StoreResult<Option<Attachment>>;
}
