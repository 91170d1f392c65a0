/// HTML dashboard
///
/// `GET /` renders `templates/dashboard.html`. Everything the template shows is
/// decided here: labels, CSS classes, which actions a card offers and whether
/// it is overdue. The template only loops and prints.
///
/// The page always renders with 200; when the database cannot be read it shows
/// an empty board with a warning banner.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use askama::Template;
use axum::{extract::State, response::Html};
use chrono::{NaiveDate, Utc};
use taskboard_shared::error::StoreResult;
use taskboard_shared::lifecycle::{TaskLifecycle, TaskOrder};
use taskboard_shared::models::{Attachment, Category, Priority, Task, TaskStats, TaskStatus};
use tracing::warn;

/// One task as the dashboard shows it
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCard {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub has_description: bool,
    pub priority_class: &'static str,
    pub priority_label: &'static str,
    pub status_class: &'static str,
    pub status_label: &'static str,
    pub has_category: bool,
    pub category_name: String,
    pub category_color: String,
    pub has_due_date: bool,
    pub due_label: String,
    pub is_overdue: bool,
    pub created_label: String,
    pub can_start: bool,
    pub can_complete: bool,
    pub attachments: Vec<AttachmentLine>,
}

/// Attachment as listed under a card
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentLine {
    pub filename: String,
    pub size_label: String,
}

impl From<&Attachment> for AttachmentLine {
    fn from(attachment: &Attachment) -> Self {
        Self {
            filename: attachment.filename.clone(),
            size_label: size_label(attachment.size_bytes),
        }
    }
}

fn size_label(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    let bytes_f = bytes as f64;

    if bytes_f < KB {
        format!("{} B", bytes)
    } else if bytes_f < KB * KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{:.1} MB", bytes_f / (KB * KB))
    }
}

impl TaskCard {
    pub fn new(task: &Task, today: NaiveDate) -> Self {
        let description = task.description.clone().unwrap_or_default();

        Self {
            id: task.id,
            title: task.title.clone(),
            has_description: !description.trim().is_empty(),
            description,
            priority_class: task.priority.as_str(),
            priority_label: task.priority.label(),
            status_class: task.status.as_str(),
            status_label: task.status.label(),
            has_category: task.category_name.is_some(),
            category_name: task.category_name.clone().unwrap_or_default(),
            category_color: task.category_color.clone().unwrap_or_default(),
            has_due_date: task.due_date.is_some(),
            due_label: task
                .due_date
                .map(|d| d.format("%b %-d, %Y").to_string())
                .unwrap_or_default(),
            is_overdue: task
                .due_date
                .map(|d| d < today && !task.status.is_terminal())
                .unwrap_or(false),
            created_label: task
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            can_start: task.status.can_transition_to(TaskStatus::InProgress),
            can_complete: task.status.can_transition_to(TaskStatus::Completed),
            attachments: task.attachments.iter().map(AttachmentLine::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriorityOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Counters for the stats strip
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsView {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub completion_percent: u8,
}

impl From<TaskStats> for StatsView {
    fn from(stats: TaskStats) -> Self {
        Self {
            total: stats.total,
            pending: stats.pending,
            in_progress: stats.in_progress,
            completed: stats.completed,
            completion_percent: stats.completion_percent(),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub cards: Vec<TaskCard>,
    pub categories: Vec<CategoryOption>,
    pub priorities: Vec<PriorityOption>,
    pub stats: StatsView,
    pub db_error: bool,
    pub uploads_enabled: bool,
    pub version: &'static str,
}

impl DashboardTemplate {
    /// Builds the page from already-ordered tasks
    pub fn build(
        tasks: &[Task],
        stats: TaskStats,
        categories: &[Category],
        today: NaiveDate,
        uploads_enabled: bool,
    ) -> Self {
        Self {
            cards: tasks.iter().map(|t| TaskCard::new(t, today)).collect(),
            categories: categories
                .iter()
                .map(|c| CategoryOption {
                    id: c.id,
                    name: c.name.clone(),
                })
                .collect(),
            priorities: priority_options(),
            stats: stats.into(),
            db_error: false,
            uploads_enabled,
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Empty board with the database warning shown
    pub fn unavailable() -> Self {
        Self {
            db_error: true,
            ..Self::build(&[], TaskStats::default(), &[], Utc::now().date_naive(), false)
        }
    }
}

fn priority_options() -> Vec<PriorityOption> {
    [Priority::High, Priority::Medium, Priority::Low]
        .into_iter()
        .map(|p| PriorityOption {
            value: p.as_str(),
            label: p.label(),
            selected: p == Priority::default(),
        })
        .collect()
}

async fn load(lifecycle: &TaskLifecycle) -> StoreResult<DashboardTemplate> {
    let tasks = lifecycle.list(TaskOrder::Dashboard).await?;
    let stats = lifecycle.stats().await?;
    let categories = lifecycle.categories().await?;

    Ok(DashboardTemplate::build(
        &tasks,
        stats,
        &categories,
        Utc::now().date_naive(),
        lifecycle.attachments_enabled(),
    ))
}

/// Dashboard handler
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let page = match load(&state.lifecycle).await {
        Ok(page) => page,
        Err(err) => {
            warn!(error = %err, "Dashboard rendered without data");
            DashboardTemplate::unavailable()
        }
    };

    let html = page
        .render()
        .map_err(|e| ApiError::InternalError(format!("Template render failed: {}", e)))?;

    Ok(Html(html))
}
