//! Task Routes
//!
//! Endpoints:
//! - GET /api/v1/tasks - List the caller's tasks
//! - GET /api/v1/tasks/:id - Task status and statistics
//! - GET /api/v1/tasks/:id/download - Translated document

use axum::{
    body::Body,
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::tasks::{Task, TaskError, TaskStatus};

use super::session::CurrentSession;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/:id", get(get_task))
        .route("/:id/download", get(download))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

/// GET /api/v1/tasks
async fn list_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Json<TaskListResponse> {
    let tasks = state.tasks().list(&session.token).await;
    let total = tasks.len();
    Json(TaskListResponse { tasks, total })
}

/// GET /api/v1/tasks/:id
async fn get_task(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>> {
    Ok(Json(state.tasks().get(&session.token, id).await?))
}

/// GET /api/v1/tasks/:id/download
async fn download(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let task = state.tasks().get(&session.token, id).await?;
    if task.status != TaskStatus::Completed {
        return Err(TaskError::NotReady(task.status).into());
    }
    let path = task
        .output_path
        .as_ref()
        .ok_or_else(|| AppError::Internal(format!("Completed task {} has no output", id)))?;

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::error!(task_id = %id, error = %e, "Failed to read task output");
        AppError::NotFound("Output file is no longer available".to_string())
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, task.output_format.content_type())
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CONTENT_DISPOSITION, attachment(&task.output_filename()))
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Content-Disposition with an ASCII fallback and the UTF-8 name
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
