/// Task lifecycle manager
///
/// Sits between request handlers and a [`TaskStore`], validating input and
/// enforcing the forward-only status machine:
///
/// ```text
/// start:    pending               → in-progress
/// complete: pending | in-progress → completed
/// delete:   any status            → (row removed)
/// ```
///
/// A `start` or `complete` on a task whose status does not allow it is not an
/// error: the outcome is [`Transition::Ignored`] carrying the unchanged task,
/// and the attempt is logged. Retried form submissions therefore stay harmless.
///
/// # Attachments
///
/// With a blob store attached ([`TaskLifecycle::with_blobs`]) files can be
/// uploaded against a task. The content goes to the blob store first and the
/// metadata row second; if the row cannot be written the blob is removed
/// again. Deleting a task removes its attachment rows in the same database
/// step and then deletes their blobs; a blob that cannot be deleted is logged
/// and does not fail the delete.
///
/// # Listing order
///
/// - [`TaskOrder::Newest`]: creation time descending (the JSON API)
/// - [`TaskOrder::Dashboard`]: priority high → medium → low, newest first
///   within each priority
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_shared::lifecycle::{TaskLifecycle, TaskOrder};
/// use taskboard_shared::models::NewTask;
/// use taskboard_shared::store::MemoryStore;
///
/// # async fn example() -> Result<(), taskboard_shared::error::StoreError> {
/// let lifecycle = TaskLifecycle::new(Arc::new(MemoryStore::new()));
///
/// let task = lifecycle.create(NewTask {
///     title: "Buy milk".to_string(),
///     ..Default::default()
/// }).await?;
///
/// lifecycle.start(task.id).await?;
/// lifecycle.complete(task.id).await?;
///
/// let board = lifecycle.list(TaskOrder::Dashboard).await?;
/// # Ok(())
/// # }
/// ```

use crate::error::{AttachError, StoreError, StoreResult};
use crate::models::{
    Attachment, Category, NewAttachment, NewCategory, NewTask, Task, TaskStats, TaskStatus, Upload,
};
use crate::storage::{BlobStore, StorageError};
use crate::store::TaskStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    /// Newest created first, regardless of priority
    Newest,

    /// Priority first, then newest created first
    Dashboard,
}

impl TaskOrder {
    /// Reorders a newest-first list in place
    ///
    /// The sort is stable, so the creation order inside a priority tier is kept.
    pub fn apply(&self, tasks: &mut [Task]) {
        if let TaskOrder::Dashboard = self {
            tasks.sort_by_key(|t| t.priority.rank());
        }
    }
}

/// Outcome of a status change request
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Status changed; carries the updated task
    Applied(Task),

    /// Current status does not allow the change; carries the unchanged task
    Ignored(Task),
}

impl Transition {
    pub fn task(&self) -> &Task {
        match self {
            Transition::Applied(task) | Transition::Ignored(task) => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            Transition::Applied(task) | Transition::Ignored(task) => task,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Validating, state-enforcing facade over a [`TaskStore`]
#[derive(Clone)]
pub struct TaskLifecycle {
    store: Arc<dyn TaskStore>,
    blobs: Option<Arc<dyn BlobStore>>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store, blobs: None }
    }

    /// Keeps attachment content in `blobs`
    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Whether uploads have somewhere to go
    pub fn attachments_enabled(&self) -> bool {
        self.blobs.is_some()
    }

    /// Creates a task in pending status
    ///
    /// # Errors
    ///
    /// - `Validation` if the title is blank; nothing is written
    /// - `ConstraintViolation` if `category_id` does not exist
    pub async fn create(&self, data: NewTask) -> StoreResult<Task> {
        let data = data.normalized();
        data.validate()?;

        let task = self.store.create_task(&data).await?;
        info!(
            task_id = task.id,
            priority = %task.priority,
            category_id = ?task.category_id,
            "Task created"
        );
        Ok(task)
    }

    /// Fetches one task
    pub async fn get(&self, id: i32) -> StoreResult<Task> {
        self.store
            .find_task(id)
            .await?
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    pub async fn list(&self, order: TaskOrder) -> StoreResult<Vec<Task>> {
        let mut tasks = self.store.list_tasks().await?;
        order.apply(&mut tasks);
        Ok(tasks)
    }

    /// pending → in-progress
    pub async fn start(&self, id: i32) -> StoreResult<Transition> {
        self.transition(id, TaskStatus::InProgress).await
    }

    /// pending | in-progress → completed
    pub async fn complete(&self, id: i32) -> StoreResult<Transition> {
        self.transition(id, TaskStatus::Completed).await
    }

    /// Removes a task regardless of status, with its attachments
    pub async fn delete(&self, id: i32) -> StoreResult<()> {
        let removed = self
            .store
            .delete_task(id)
            .await?
            .ok_or_else(|| StoreError::task_not_found(id))?;

        info!(task_id = id, attachments = removed.len(), "Task deleted");
        self.remove_blobs(id, &removed).await;
        Ok(())
    }

    /// Stores an uploaded file against a task
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty file or a missing filename
    /// - `NotFound` if the task does not exist; nothing is uploaded
    /// - `StorageError::NotConfigured` without a blob store
    /// - any blob store failure; no row is written
    pub async fn attach(&self, task_id: i32, upload: Upload) -> Result<Attachment, AttachError> {
        let data = NewAttachment::from_upload(task_id, &upload);
        data.validate()?;

        self.get(task_id).await?;
        let blobs = self.blobs.as_ref().ok_or(StorageError::NotConfigured)?;

        blobs
            .put(&data.blob_name, &data.content_type, upload.body)
            .await?;

        match self.store.create_attachment(&data).await {
            Ok(attachment) => {
                info!(
                    task_id,
                    attachment_id = attachment.id,
                    blob = %attachment.blob_name,
                    size_bytes = attachment.size_bytes,
                    "Attachment stored"
                );
                Ok(attachment)
            }
            Err(err) => {
                // Task vanished between the lookup and the insert
                if let Err(cleanup) = blobs.delete(&data.blob_name).await {
                    warn!(blob = %data.blob_name, error = %cleanup, "Failed to remove unreferenced blob");
                }
                Err(err.into())
            }
        }
    }

    /// Fetches attachment metadata
    pub async fn attachment(&self, id: i32) -> StoreResult<Attachment> {
        self.store
            .find_attachment(id)
            .await?
            .ok_or_else(|| StoreError::attachment_not_found(id))
    }

    /// Aggregate counts for the dashboard
    pub async fn stats(&self) -> StoreResult<TaskStats> {
        self.store.task_stats().await
    }

    pub async fn categories(&self) -> StoreResult<Vec<Category>> {
        self.store.list_categories().await
    }

    /// Creates a category; an existing name wins and is returned unchanged
    pub async fn create_category(&self, data: NewCategory) -> StoreResult<(Category, bool)> {
        let data = data.normalized();
        data.validate()?;

        let (category, inserted) = self.store.create_category(&data).await?;
        if inserted {
            info!(category_id = category.id, name = %category.name, "Category created");
        } else {
            info!(category_id = category.id, name = %category.name, "Category already exists");
        }
        Ok((category, inserted))
    }

    pub async fn delete_category(&self, id: i32) -> StoreResult<()> {
        if !self.store.delete_category(id).await? {
            return Err(StoreError::category_not_found(id));
        }
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    async fn remove_blobs(&self, task_id: i32, attachments: &[Attachment]) {
        if attachments.is_empty() {
            return;
        }

        let Some(blobs) = &self.blobs else {
            warn!(
                task_id,
                count = attachments.len(),
                "Blob storage not configured; attachment blobs left in place"
            );
            return;
        };

        for attachment in attachments {
            match blobs.delete(&attachment.blob_name).await {
                Ok(true) => debug!(blob = %attachment.blob_name, "Attachment blob deleted"),
                Ok(false) => warn!(blob = %attachment.blob_name, "Attachment blob was already gone"),
                Err(err) => warn!(
                    blob = %attachment.blob_name,
                    error = %err,
                    "Failed to delete attachment blob"
                ),
            }
        }
    }

    async fn transition(&self, id: i32, to: TaskStatus) -> StoreResult<Transition> {
        let from = TaskStatus::allowed_sources(to);

        if let Some(task) = self.store.advance_status(id, to, from).await? {
            info!(task_id = id, status = %to, "Task status changed");
            return Ok(Transition::Applied(task));
        }

        let current = self.get(id).await?;
        warn!(
            task_id = id,
            current = %current.status,
            requested = %to,
            "Ignoring status transition not allowed from current status"
        );
        Ok(Transition::Ignored(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::storage::MemoryBlobStore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;

    fn lifecycle() -> TaskLifecycle {
        TaskLifecycle::new(Arc::new(MemoryStore::new()))
    }

    fn titled(title: &str, priority: Priority) -> NewTask {
        NewTask {
            title: title.to_string(),
            priority,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_title_rejected_and_not_persisted() {
        let lifecycle = lifecycle();

        for title in ["", "   ", "\t\n"] {
            let err = lifecycle
                .create(titled(title, Priority::Medium))
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "title {:?}", title);
        }

        assert!(lifecycle.list(TaskOrder::Newest).await.unwrap().is_empty());
        assert_eq!(lifecycle.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_new_task_is_pending_with_default_priority() {
        let task = lifecycle()
            .create(NewTask {
                title: "Buy milk".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.created_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_category_is_constraint_violation() {
        let err = lifecycle()
            .create(NewTask {
                title: "Orphan".to_string(),
                category_id: Some(4242),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_forward_transitions() {
        let lifecycle = lifecycle();
        let task = lifecycle.create(titled("Paint", Priority::Low)).await.unwrap();

        let started = lifecycle.start(task.id).await.unwrap();
        assert!(started.is_applied());
        assert_eq!(started.task().status, TaskStatus::InProgress);

        let completed = lifecycle.complete(task.id).await.unwrap();
        assert!(completed.is_applied());
        assert_eq!(completed.task().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_complete_directly_from_pending() {
        let lifecycle = lifecycle();
        let task = lifecycle.create(titled("Call mom", Priority::High)).await.unwrap();

        let outcome = lifecycle.complete(task.id).await.unwrap();
        assert_eq!(outcome.into_task().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_backward_transitions_are_ignored() {
        let lifecycle = lifecycle();
        let task = lifecycle.create(titled("Review", Priority::Low)).await.unwrap();
        lifecycle.complete(task.id).await.unwrap();

        let restart = lifecycle.start(task.id).await.unwrap();
        assert!(!restart.is_applied());
        assert_eq!(restart.task().status, TaskStatus::Completed);

        let recomplete = lifecycle.complete(task.id).await.unwrap();
        assert!(!recomplete.is_applied());

        let other = lifecycle.create(titled("Draft", Priority::Low)).await.unwrap();
        lifecycle.start(other.id).await.unwrap();
        let again = lifecycle.start(other.id).await.unwrap();
        assert!(matches!(again, Transition::Ignored(ref t) if t.status == TaskStatus::InProgress));
    }

    #[tokio::test]
    async fn test_transition_on_missing_task_is_not_found() {
        let lifecycle = lifecycle();
        assert!(matches!(
            lifecycle.start(77).await.unwrap_err(),
            StoreError::NotFound { entity: "task", id: 77 }
        ));
        assert!(matches!(
            lifecycle.complete(77).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_from_listing_and_counts() {
        let lifecycle = lifecycle();
        let keep = lifecycle.create(titled("Keep", Priority::Low)).await.unwrap();
        let doomed = lifecycle.create(titled("Doomed", Priority::Low)).await.unwrap();
        lifecycle.start(doomed.id).await.unwrap();

        lifecycle.delete(doomed.id).await.unwrap();

        let ids: Vec<i32> = lifecycle
            .list(TaskOrder::Newest)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![keep.id]);
        assert_eq!(lifecycle.stats().await.unwrap().total, 1);
        assert!(matches!(
            lifecycle.get(doomed.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            lifecycle.delete(doomed.id).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_listing_orders() {
        let lifecycle = lifecycle();
        let low = lifecycle.create(titled("t1 low", Priority::Low)).await.unwrap();
        let high = lifecycle.create(titled("t2 high", Priority::High)).await.unwrap();
        let medium = lifecycle.create(titled("t3 medium", Priority::Medium)).await.unwrap();

        let dashboard: Vec<i32> = lifecycle
            .list(TaskOrder::Dashboard)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(dashboard, vec![high.id, medium.id, low.id]);

        let newest: Vec<i32> = lifecycle
            .list(TaskOrder::Newest)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(newest, vec![medium.id, high.id, low.id]);
    }

    #[tokio::test]
    async fn test_dashboard_keeps_newest_first_within_tier() {
        let lifecycle = lifecycle();
        let older = lifecycle.create(titled("older", Priority::High)).await.unwrap();
        lifecycle.create(titled("filler", Priority::Low)).await.unwrap();
        let newer = lifecycle.create(titled("newer", Priority::High)).await.unwrap();

        let board = lifecycle.list(TaskOrder::Dashboard).await.unwrap();
        assert_eq!(board[0].id, newer.id);
        assert_eq!(board[1].id, older.id);
    }

    #[tokio::test]
    async fn test_stats_after_completing_one() {
        let lifecycle = lifecycle();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            ids.push(lifecycle.create(titled(title, Priority::Medium)).await.unwrap().id);
        }
        lifecycle.complete(ids[0]).await.unwrap();

        let stats = lifecycle.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn test_duplicate_category_keeps_existing_row() {
        let lifecycle = lifecycle();
        let before = lifecycle.categories().await.unwrap();

        let (category, inserted) = lifecycle
            .create_category(NewCategory {
                name: " Personal ".to_string(),
                color: Some("#111111".to_string()),
            })
            .await
            .unwrap();

        assert!(!inserted);
        assert_eq!(category.color, "#3498db");
        assert_eq!(lifecycle.categories().await.unwrap().len(), before.len());
    }

    #[tokio::test]
    async fn test_category_validation() {
        let lifecycle = lifecycle();
        let err = lifecycle
            .create_category(NewCategory {
                name: "Garden".to_string(),
                color: Some("green".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = lifecycle.delete_category(9999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "category", .. }));
    }

    fn text_upload(filename: &str, body: &'static str) -> Upload {
        Upload {
            filename: filename.to_string(),
            content_type: Some("text/plain".to_string()),
            description: None,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn with_blobs() -> (TaskLifecycle, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let lifecycle = lifecycle().with_blobs(blobs.clone());
        (lifecycle, blobs)
    }

    /// Accepts uploads, refuses deletes
    struct StickyBlobs;

    #[async_trait]
    impl BlobStore for StickyBlobs {
        fn describe(&self) -> String {
            "sticky".to_string()
        }

        async fn put(&self, _: &str, _: &str, _: Bytes) -> Result<(), StorageError> {
            Ok(())
        }

        async fn delete(&self, _: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_attach_stores_blob_and_row() {
        let (lifecycle, blobs) = with_blobs();
        assert!(lifecycle.attachments_enabled());
        let task = lifecycle.create(titled("Taxes", Priority::High)).await.unwrap();

        let attachment = lifecycle
            .attach(task.id, text_upload("receipt.txt", "42.00"))
            .await
            .unwrap();

        assert_eq!(attachment.task_id, task.id);
        assert_eq!(attachment.filename, "receipt.txt");
        assert_eq!(attachment.size_bytes, 5);
        assert_eq!(blobs.get(&attachment.blob_name).unwrap(), Bytes::from_static(b"42.00"));
        assert_eq!(
            blobs.content_type(&attachment.blob_name).as_deref(),
            Some("text/plain")
        );

        assert_eq!(lifecycle.get(task.id).await.unwrap().attachments, vec![attachment.clone()]);
        assert_eq!(lifecycle.attachment(attachment.id).await.unwrap(), attachment);
    }

    #[tokio::test]
    async fn test_attach_rejections_upload_nothing() {
        let (lifecycle, blobs) = with_blobs();
        let task = lifecycle.create(titled("Taxes", Priority::High)).await.unwrap();

        let err = lifecycle
            .attach(task.id, text_upload("empty.txt", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachError::Store(StoreError::Validation(_))));

        let err = lifecycle
            .attach(9999, text_upload("a.txt", "data"))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachError::Store(StoreError::NotFound { .. })));

        assert!(blobs.names().is_empty());
    }

    #[tokio::test]
    async fn test_attach_without_storage() {
        let lifecycle = lifecycle();
        assert!(!lifecycle.attachments_enabled());
        let task = lifecycle.create(titled("Taxes", Priority::High)).await.unwrap();

        let err = lifecycle
            .attach(task.id, text_upload("a.txt", "data"))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachError::Storage(StorageError::NotConfigured)));
        assert!(lifecycle.get(task.id).await.unwrap().attachments.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_attachment_rows_and_blobs() {
        let (lifecycle, blobs) = with_blobs();
        let keep = lifecycle.create(titled("Keep", Priority::Low)).await.unwrap();
        let doomed = lifecycle.create(titled("Doomed", Priority::Low)).await.unwrap();

        let kept = lifecycle
            .attach(keep.id, text_upload("keep.txt", "keep"))
            .await
            .unwrap();
        let first = lifecycle
            .attach(doomed.id, text_upload("a.txt", "aaaa"))
            .await
            .unwrap();
        let second = lifecycle
            .attach(doomed.id, text_upload("b.txt", "bbbb"))
            .await
            .unwrap();

        lifecycle.delete(doomed.id).await.unwrap();

        assert_eq!(blobs.names(), vec![kept.blob_name.clone()]);
        for gone in [first.id, second.id] {
            assert!(matches!(
                lifecycle.attachment(gone).await.unwrap_err(),
                StoreError::NotFound { entity: "attachment", .. }
            ));
        }
        assert_eq!(lifecycle.attachment(kept.id).await.unwrap(), kept);
    }

    #[tokio::test]
    async fn test_blob_delete_failure_does_not_fail_task_delete() {
        let lifecycle = lifecycle().with_blobs(Arc::new(StickyBlobs));
        let task = lifecycle.create(titled("Stuck", Priority::Low)).await.unwrap();
        let attachment = lifecycle
            .attach(task.id, text_upload("a.txt", "data"))
            .await
            .unwrap();

        lifecycle.delete(task.id).await.unwrap();

        assert!(lifecycle.get(task.id).await.is_err());
        assert!(lifecycle.attachment(attachment.id).await.is_err());
    }
}
