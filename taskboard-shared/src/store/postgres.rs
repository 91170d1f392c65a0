/// PostgreSQL-backed store
///
/// Wraps a `PgPool` and the model queries. The schema bootstrap runs at most
/// once per process: the first call to any data operation runs it, and a
/// failed attempt leaves the guard unset so the next call retries. This makes
/// a database outage at startup non-fatal.
///
/// Connections come from the pool per operation and go back on every exit
/// path, including errors, because sqlx returns them on drop.

use crate::db::{pool, schema};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Attachment, Category, NewAttachment, NewCategory, NewTask, Task, TaskStats, TaskStatus,
};
use crate::store::TaskStore;
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub struct PgStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    /// Underlying pool, without schema checks
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the pool once the schema is known to exist
    async fn ready(&self) -> StoreResult<&PgPool> {
        self.schema_ready
            .get_or_try_init(|| async {
                schema::bootstrap(&self.pool).await.map_err(|e| {
                    warn!(error = %e, "Schema bootstrap failed, will retry on next request");
                    StoreError::from(e)
                })
            })
            .await?;

        Ok(&self.pool)
    }

    pub async fn close(&self) {
        pool::close_pool(&self.pool).await;
    }
}

#[async_trait]
impl TaskStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.ready().await.map(|_| ())
    }

    async fn ping(&self) -> StoreResult<()> {
        pool::health_check(&self.pool).await.map_err(StoreError::from)
    }

    async fn create_task(&self, data: &NewTask) -> StoreResult<Task> {
        let pool = self.ready().await?;
        let task = Task::create(pool, data).await?;
        debug!(task_id = task.id, "Task inserted");
        Ok(task)
    }

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(self.ready().await?, id).await?)
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        Ok(Task::list_newest_first(self.ready().await?).await?)
    }

    async fn advance_status(
        &self,
        id: i32,
        to: TaskStatus,
        from: &[TaskStatus],
    ) -> StoreResult<Option<Task>> {
        Ok(Task::advance_status(self.ready().await?, id, to, from).await?)
    }

    async fn delete_task(&self, id: i32) -> StoreResult<Option<Vec<Attachment>>> {
        Ok(Task::delete(self.ready().await?, id).await?)
    }

    async fn task_stats(&self) -> StoreResult<TaskStats> {
        Ok(TaskStats::compute(self.ready().await?).await?)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        Ok(Category::list(self.ready().await?).await?)
    }

    async fn create_category(&self, data: &NewCategory) -> StoreResult<(Category, bool)> {
        match Category::create_if_absent(self.ready().await?, data).await {
            Ok(outcome) => Ok(outcome),
            Err(sqlx::Error::RowNotFound) => Err(StoreError::ConstraintViolation(format!(
                "category '{}' was deleted and recreated concurrently; retry",
                data.name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_category(&self, id: i32) -> StoreResult<bool> {
        Ok(Category::delete(self.ready().await?, id).await?)
    }

    async fn create_attachment(&self, data: &NewAttachment) -> StoreResult<Attachment> {
        let attachment = Attachment::create(self.ready().await?, data).await?;
        debug!(attachment_id = attachment.id, task_id = data.task_id, "Attachment inserted");
        Ok(attachment)
    }

    async fn find_attachment(&self, id: i32) -> StoreResult<Option<Attachment>> {
        Ok(Attachment::find_by_id(self.ready().await?, id).await?)
    }
}
