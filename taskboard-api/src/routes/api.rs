/// JSON read API and category management
///
/// # Endpoints
///
/// ```text
/// GET    /api/tasks             {"tasks": [...]}, newest first
/// GET    /api/tasks/:id         one task
/// GET    /api/attachments/:id   attachment metadata
/// GET    /api/categories        {"categories": [...]}, by name
/// POST   /api/categories        {"name", "color"?}
/// DELETE /api/categories/:id
/// ```
///
/// # Task shape
///
/// ```json
/// {
///   "id": 1,
///   "title": "Buy milk",
///   "description": null,
///   "category_id": 2,
///   "priority": "medium",
///   "status": "pending",
///   "due_date": "2026-10-20",
///   "created_at": "2026-10-19T09:12:44.120Z",
///   "updated_at": "2026-10-19T09:12:44.120Z",
///   "category_name": "Work",
///   "category_color": "#2ecc71",
///   "attachments": [
///     {
///       "id": 3,
///       "task_id": 1,
///       "filename": "list.txt",
///       "description": null,
///       "content_type": "text/plain",
///       "size_bytes": 120,
///       "blob_name": "attachments/1/8c1f...-list.txt",
///       "created_at": "2026-10-19T09:13:02.511Z"
///     }
///   ]
/// }
/// ```

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::lifecycle::TaskOrder;
use taskboard_shared::models::{Attachment, Category, NewCategory, Task};

/// Task listing response
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
}

/// Category listing response
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

/// List tasks, strictly newest-created first
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<TaskList>> {
    let tasks = state.lifecycle.list(TaskOrder::Newest).await?;
    Ok(Json(TaskList { tasks }))
}

/// Fetch one task; 404 when absent
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.lifecycle.get(id).await?))
}

/// Fetch attachment metadata; 404 when absent
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Attachment>> {
    Ok(Json(state.lifecycle.attachment(id).await?))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<CategoryList>> {
    let categories = state.lifecycle.categories().await?;
    Ok(Json(CategoryList { categories }))
}

/// Create a category
///
/// 201 with the new row, or 200 with the existing row when the name is taken.
pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let Json(data) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (category, inserted) = state.lifecycle.create_category(data).await?;
    let status = if inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(category)))
}

/// Delete a category; 400 while tasks still reference it
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.lifecycle.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
