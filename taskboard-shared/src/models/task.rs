/// Task model and database operations
///
/// # State Machine
///
/// ```text
/// pending → in-progress → completed
/// pending ──────────────→ completed
/// ```
///
/// Status only moves forward. The conditional `UPDATE ... WHERE status = ANY(..)`
/// in [`Task::advance_status`] enforces this at the database, so two racing
/// requests can never move a task backwards.
///
/// # Row mapping
///
/// Queries decode into [`TaskRow`], which mirrors the SQL result column by
/// column with status and priority as plain text. [`Task`] is produced from it
/// by an explicit `TryFrom` conversion that rejects unknown enum values.
/// Attachments arrive in the same row as a JSON array built by `json_agg`.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::task::{NewTask, Priority, Task, TaskStatus};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let task = Task::create(&pool, &NewTask {
///     title: "Buy milk".to_string(),
///     description: None,
///     category_id: None,
///     priority: Priority::High,
///     due_date: None,
/// }).await?;
///
/// Task::advance_status(&pool, task.id, TaskStatus::InProgress, &[TaskStatus::Pending]).await?;
/// # Ok(())
/// # }
/// ```

use crate::models::attachment::Attachment;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Columns selected for every task query, joined with its category and
/// carrying its attachments
const TASK_SELECT: &str = r#"
    SELECT t.id, t.title, t.description, t.category_id, t.priority, t.status,
           t.due_date, t.created_at, t.updated_at,
           c.name AS category_name, c.color AS category_color,
           COALESCE(
               (SELECT json_agg(a ORDER BY a.id) FROM attachments a WHERE a.task_id = t.id),
               '[]'::json
           ) AS attachments
    FROM tasks t
    LEFT JOIN categories c ON c.id = t.category_id
"#;

/// Unknown textual value for an enumerated column or input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: String,
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Created, not started
    Pending,

    /// Being worked on
    InProgress,

    /// Done; no further transitions
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    /// Converts status to its stored text form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        Self::allowed_sources(target).contains(self)
    }

    /// Statuses from which `target` may be entered
    pub fn allowed_sources(target: TaskStatus) -> &'static [TaskStatus] {
        match target {
            TaskStatus::Pending => &[],
            TaskStatus::InProgress => &[TaskStatus::Pending],
            TaskStatus::Completed => &[TaskStatus::Pending, TaskStatus::InProgress],
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ParseValueError {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Dashboard sort rank; lower sorts first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseValueError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Raw task row as returned by the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub priority: String,
    pub status: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub attachments: Json<Vec<Attachment>>,
}

/// Task record with its category joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,

    /// Files attached to the task, oldest first
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl TryFrom<TaskRow> for Task {
    type Error = ParseValueError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            category_id: row.category_id,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category_name: row.category_name,
            category_color: row.category_color,
            attachments: row.attachments.0,
        })
    }
}

/// Input for creating a new task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewTask {
    /// Required, non-blank
    #[validate(length(min = 1, max = 255, message = "title is required (at most 255 characters)"))]
    pub title: String,

    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: Option<String>,

    /// Must reference an existing category when present
    pub category_id: Option<i32>,

    #[serde(default)]
    pub priority: Priority,

    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// Trims the title and drops a blank description
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }
}

/// Aggregate task counts taken from a single statement snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl TaskStats {
    /// Tallies a task set in memory
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(TaskStats::default(), |mut stats, task| {
            stats.total += 1;
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            stats
        })
    }

    /// Completed share in whole percent, 0 when there are no tasks
    pub fn completion_percent(&self) -> u8 {
        if self.total <= 0 {
            return 0;
        }
        ((self.completed * 100) / self.total).clamp(0, 100) as u8
    }

    /// Counts tasks by status in one statement
    pub async fn compute(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let (total, pending, in_progress, completed): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'pending'),
                   COUNT(*) FILTER (WHERE status = 'in-progress'),
                   COUNT(*) FILTER (WHERE status = 'completed')
            FROM tasks
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(TaskStats {
            total,
            pending,
            in_progress,
            completed,
        })
    }
}

fn decode(row: TaskRow) -> Result<Task, sqlx::Error> {
    Task::try_from(row).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl Task {
    /// Inserts a new task in pending status
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if `category_id` does not exist.
    pub async fn create(pool: &PgPool, data: &NewTask) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            WITH t AS (
                INSERT INTO tasks (title, description, category_id, priority, due_date)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            {}
            "#,
            TASK_SELECT.replace("FROM tasks t", "FROM t")
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.category_id)
            .bind(data.priority.as_str())
            .bind(data.due_date)
            .fetch_one(pool)
            .await?;

        decode(row)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("{} WHERE t.id = $1", TASK_SELECT);

        sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(decode)
            .transpose()
    }

    /// Lists every task, newest created first
    pub async fn list_newest_first(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("{} ORDER BY t.created_at DESC, t.id DESC", TASK_SELECT);

        sqlx::query_as::<_, TaskRow>(&query)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Moves a task to `to` if its current status is one of `from`
    ///
    /// Refreshes `updated_at`. Returns `None` when the task is missing or its
    /// status is not in `from`.
    pub async fn advance_status(
        pool: &PgPool,
        id: i32,
        to: TaskStatus,
        from: &[TaskStatus],
    ) -> Result<Option<Self>, sqlx::Error> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!(
            r#"
            WITH t AS (
                UPDATE tasks
                SET status = $2, updated_at = NOW()
                WHERE id = $1 AND status = ANY($3)
                RETURNING *
            )
            {}
            "#,
            TASK_SELECT.replace("FROM tasks t", "FROM t")
        );

        sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .bind(to.as_str())
            .bind(from)
            .fetch_optional(pool)
            .await?
            .map(decode)
            .transpose()
    }

    /// Hard-deletes a task together with its attachment rows
    ///
    /// Returns the removed attachments, or `None` when there is no such task.
    /// The task row is locked first, so an attachment inserted concurrently
    /// (which takes a key-share lock on the task) waits and then fails on the
    /// foreign key instead of being orphaned.
    pub async fn delete(pool: &PgPool, id: i32) -> Result<Option<Vec<Attachment>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(i32,)> = sqlx::query_as("SELECT id FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(None);
        }

        let attachments = sqlx::query_as::<_, Attachment>(
            r#"
            DELETE FROM attachments
            WHERE task_id = $1
            RETURNING id, task_id, filename, description, content_type, size_bytes, blob_name, created_at
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(attachments))
    }
}
