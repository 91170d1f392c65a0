/// In-memory store
///
/// Holds categories and tasks behind a mutex and mirrors the PostgreSQL
/// store's semantics: serial ids, unique category names, a non-cascading
/// category reference, conditional status updates, newest-first listing and
/// attachments that only exist while their task does.
/// It is seeded with the same default categories as the schema bootstrap.

use crate::db::schema::DEFAULT_CATEGORIES;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Attachment, Category, NewAttachment, NewCategory, NewTask, Task, TaskStats, TaskStatus,
};
use crate::store::TaskStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    tasks: Vec<Task>,
    attachments: Vec<Attachment>,
    next_category_id: i32,
    next_task_id: i32,
    next_attachment_id: i32,
}

impl State {
    fn category(&self, id: i32) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    fn insert_category(&mut self, name: &str, color: &str) -> Category {
        self.next_category_id += 1;
        let category = Category {
            id: self.next_category_id,
            name: name.to_string(),
            color: color.to_string(),
            created_at: Some(Utc::now()),
        };
        self.categories.push(category.clone());
        category
    }

    /// Re-reads the joined category columns and attachments, as the SQL would
    fn joined(&self, task: &Task) -> Task {
        let mut task = task.clone();
        let category = task.category_id.and_then(|id| self.category(id));
        task.category_name = category.map(|c| c.name.clone());
        task.category_color = category.map(|c| c.color.clone());
        task.attachments = self
            .attachments
            .iter()
            .filter(|a| a.task_id == task.id)
            .cloned()
            .collect();
        task
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates a store seeded with the default categories
    pub fn new() -> Self {
        let mut state = State::default();
        for (name, color) in DEFAULT_CATEGORIES {
            state.insert_category(name, color);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Creates a store with no categories at all
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::DatabaseUnavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    async fn create_task(&self, data: &NewTask) -> StoreResult<Task> {
        let mut state = self.lock()?;

        if data.title.trim().is_empty() {
            return Err(StoreError::ConstraintViolation(
                "tasks_title_check".to_string(),
            ));
        }
        if let Some(category_id) = data.category_id {
            if state.category(category_id).is_none() {
                return Err(StoreError::ConstraintViolation(format!(
                    "category {} does not exist (tasks_category_id_fkey)",
                    category_id
                )));
            }
        }

        state.next_task_id += 1;
        let now = Utc::now();
        let task = Task {
            id: state.next_task_id,
            title: data.title.clone(),
            description: data.description.clone(),
            category_id: data.category_id,
            priority: data.priority,
            status: TaskStatus::Pending,
            due_date: data.due_date,
            created_at: Some(now),
            updated_at: Some(now),
            category_name: None,
            category_color: None,
            attachments: Vec::new(),
        };
        state.tasks.push(task.clone());

        Ok(state.joined(&task))
    }

    async fn find_task(&self, id: i32) -> StoreResult<Option<Task>> {
        let state = self.lock()?;
        Ok(state.tasks.iter().find(|t| t.id == id).map(|t| state.joined(t)))
    }

    async fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let state = self.lock()?;
        let mut tasks: Vec<Task> = state.tasks.iter().map(|t| state.joined(t)).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn advance_status(
        &self,
        id: i32,
        to: TaskStatus,
        from: &[TaskStatus],
    ) -> StoreResult<Option<Task>> {
        let mut state = self.lock()?;

        let Some(task) = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && from.contains(&t.status))
        else {
            return Ok(None);
        };

        task.status = to;
        task.updated_at = Some(Utc::now());
        let task = task.clone();

        Ok(Some(state.joined(&task)))
    }

    async fn delete_task(&self, id: i32) -> StoreResult<Option<Vec<Attachment>>> {
        let mut state = self.lock()?;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Ok(None);
        }

        let (removed, kept): (Vec<Attachment>, Vec<Attachment>) = std::mem::take(&mut state.attachments)
            .into_iter()
            .partition(|a| a.task_id == id);
        state.attachments = kept;
        Ok(Some(removed))
    }

    async fn task_stats(&self) -> StoreResult<TaskStats> {
        let state = self.lock()?;
        Ok(TaskStats::tally(&state.tasks))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.lock()?;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, data: &NewCategory) -> StoreResult<(Category, bool)> {
        let mut state = self.lock()?;

        if let Some(existing) = state.categories.iter().find(|c| c.name == data.name) {
            return Ok((existing.clone(), false));
        }

        let category = state.insert_category(&data.name, data.color_or_default());
        Ok((category, true))
    }

    async fn delete_category(&self, id: i32) -> StoreResult<bool> {
        let mut state = self.lock()?;

        if state.tasks.iter().any(|t| t.category_id == Some(id)) {
            return Err(StoreError::ConstraintViolation(format!(
                "category {} is still referenced by tasks (tasks_category_id_fkey)",
                id
            )));
        }

        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        Ok(state.categories.len() < before)
    }

    async fn create_attachment(&self, data: &NewAttachment) -> StoreResult<Attachment> {
        let mut state = self.lock()?;

        if !state.tasks.iter().any(|t| t.id == data.task_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "task {} does not exist (attachments_task_id_fkey)",
                data.task_id
            )));
        }
        if state.attachments.iter().any(|a| a.blob_name == data.blob_name) {
            return Err(StoreError::ConstraintViolation(
                "attachments_blob_name_key".to_string(),
            ));
        }

        state.next_attachment_id += 1;
        let attachment = Attachment {
            id: state.next_attachment_id,
            task_id: data.task_id,
            filename: data.filename.clone(),
            description: data.description.clone(),
            content_type: data.content_type.clone(),
            size_bytes: data.size_bytes,
            blob_name: data.blob_name.clone(),
            created_at: Some(Utc::now()),
        };
        state.attachments.push(attachment.clone());
        Ok(attachment)
    }

    async fn find_attachment(&self, id: i32) -> StoreResult<Option<Attachment>> {
        let state = self.lock()?;
        Ok(state.attachments.iter().find(|a| a.id == id).cloned())
    }
}
