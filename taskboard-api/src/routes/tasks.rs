/// Task write endpoints shared by the dashboard forms and JSON clients
///
/// # Endpoints
///
/// ```text
/// POST /tasks                 create (form or JSON body)
/// POST /tasks/:id/start       pending -> in-progress
/// POST /tasks/:id/complete    pending | in-progress -> completed
/// POST /tasks/:id/delete      remove the row, its attachments and their blobs
/// POST /tasks/:id/attachments multipart upload: `file`, optional `description`
/// ```
///
/// JSON callers (an `Accept` or `Content-Type` naming JSON) get explicit
/// responses. Browser form posts to start, complete and delete are always
/// answered with a 303 back to the dashboard, even when the id in the URL is
/// malformed; a failure is logged and otherwise dropped so the board stays
/// usable. Create and upload redirect browsers only on success and report
/// rejected input to every caller.

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    async_trait,
    body::Bytes,
    extract::{
        multipart::MultipartRejection,
        rejection::PathRejection,
        FromRequest, FromRequestParts, Multipart, Path, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use taskboard_shared::lifecycle::Transition;
use taskboard_shared::models::{NewTask, Priority, Upload};
use tracing::warn;

/// Task id segment, kept fallible so malformed ids reach the handler
type TaskPath = Result<Path<i32>, PathRejection>;

/// Task id from the URL; a non-numeric or out-of-range id is a bad request
fn task_id(path: TaskPath) -> ApiResult<i32> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// How the caller wants to be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responder {
    Json,
    Redirect,
}

impl Responder {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let names_json = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("json"))
                .unwrap_or(false)
        };

        if names_json(header::ACCEPT) || names_json(header::CONTENT_TYPE) {
            Responder::Json
        } else {
            Responder::Redirect
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Responder {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Responder::from_headers(&parts.headers))
    }
}

/// Category reference as it arrives: a JSON number or a form string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CategoryRef {
    Id(i64),
    Text(String),
}

/// Raw task submission from either a form or a JSON body
#[derive(Debug, Default, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    category_id: Option<CategoryRef>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

fn filled(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TaskInput {
    /// Parses the loosely typed fields; blank optional fields count as absent
    pub fn into_new_task(self) -> Result<NewTask, ApiError> {
        let category_id = match self.category_id {
            None => None,
            Some(CategoryRef::Id(id)) => Some(
                i32::try_from(id)
                    .map_err(|_| ApiError::BadRequest(format!("Invalid category: {}", id)))?,
            ),
            Some(CategoryRef::Text(text)) => match filled(Some(text)) {
                None => None,
                Some(text) => Some(
                    text.parse::<i32>()
                        .map_err(|_| ApiError::BadRequest(format!("Invalid category: {}", text)))?,
                ),
            },
        };

        let priority = match filled(self.priority) {
            None => Priority::default(),
            Some(p) => p
                .parse::<Priority>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        };

        let due_date = filled(self.due_date)
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                    .map_err(|_| ApiError::BadRequest(format!("Invalid due date: {}", d)))
            })
            .transpose()?;

        Ok(NewTask {
            title: self.title.unwrap_or_default(),
            description: self.description,
            category_id,
            priority,
            due_date,
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for TaskInput {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        if is_json {
            let Json(input) = Json::<TaskInput>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(input)
        } else {
            let Form(input) = Form::<TaskInput>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(input)
        }
    }
}

/// Response body for a created task
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: i32,
}

/// Create task handler
///
/// JSON: 201 `{"id": n}`. Form: 303 to `/`. A missing title is a 400 either way.
pub async fn create_task(
    State(state): State<AppState>,
    responder: Responder,
    input: TaskInput,
) -> ApiResult<Response> {
    let task = state.lifecycle.create(input.into_new_task()?).await?;

    Ok(match responder {
        Responder::Json => (StatusCode::CREATED, Json(CreatedTask { id: task.id })).into_response(),
        Responder::Redirect => Redirect::to("/").into_response(),
    })
}

/// Start task handler
pub async fn start_task(
    State(state): State<AppState>,
    responder: Responder,
    path: TaskPath,
) -> Response {
    let outcome = match task_id(path) {
        Ok(id) => state
            .lifecycle
            .start(id)
            .await
            .map(Transition::into_task)
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    action_response("start", responder, outcome)
}

/// Complete task handler
pub async fn complete_task(
    State(state): State<AppState>,
    responder: Responder,
    path: TaskPath,
) -> Response {
    let outcome = match task_id(path) {
        Ok(id) => state
            .lifecycle
            .complete(id)
            .await
            .map(Transition::into_task)
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    action_response("complete", responder, outcome)
}

/// Delete task handler
///
/// JSON: 200 `{"deleted": id}`, 404 when absent.
pub async fn delete_task(
    State(state): State<AppState>,
    responder: Responder,
    path: TaskPath,
) -> Response {
    let outcome = match task_id(path) {
        Ok(id) => state
            .lifecycle
            .delete(id)
            .await
            .map(|()| serde_json::json!({ "deleted": id }))
            .map_err(ApiError::from),
        Err(err) => Err(err),
    };
    action_response("delete", responder, outcome)
}

/// JSON callers get the body or the error; browsers always go back to `/`
fn action_response<T: Serialize>(
    action: &'static str,
    responder: Responder,
    outcome: ApiResult<T>,
) -> Response {
    match (outcome, responder) {
        (Ok(body), Responder::Json) => Json(body).into_response(),
        (Ok(_), Responder::Redirect) => Redirect::to("/").into_response(),
        (Err(err), Responder::Json) => err.into_response(),
        (Err(err), Responder::Redirect) => {
            warn!(action, error = %err, "Task action from dashboard failed");
            Redirect::to("/").into_response()
        }
    }
}

/// Upload attachment handler
///
/// JSON: 201 with the attachment. Form: 303 to `/`. Missing file, empty file
/// or unknown task are reported to every caller; without blob storage the
/// answer is 500 `storage_unavailable`.
pub async fn upload_attachment(
    State(state): State<AppState>,
    responder: Responder,
    path: TaskPath,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let id = task_id(path)?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                file = Some((filename, content_type, body));
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                description = Some(text);
            }
            _ => {}
        }
    }

    let (filename, content_type, body) =
        file.ok_or_else(|| ApiError::BadRequest("Missing required 'file' field".to_string()))?;

    let attachment = state
        .lifecycle
        .attach(
            id,
            Upload {
                filename,
                content_type,
                description,
                body,
            },
        )
        .await?;

    Ok(match responder {
        Responder::Json => (StatusCode::CREATED, Json(attachment)).into_response(),
        Responder::Redirect => Redirect::to("/").into_response(),
    })
}
