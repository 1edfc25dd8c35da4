//! Error types for the Bitext server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::DocumentError;
use crate::provider::ProviderError;
use crate::tasks::{TaskError, TaskStatus};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Task(e) => task_parts(e),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        }
    }
}

fn task_parts(error: &TaskError) -> (StatusCode, &'static str, String) {
    match error {
        TaskError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", "Task not found".to_string()),
        TaskError::NotReady(status) => (
            StatusCode::CONFLICT,
            "not_ready",
            match status {
                TaskStatus::Failed => "Task failed and has no output".to_string(),
                _ => "Task has not completed yet".to_string(),
            },
        ),
        TaskError::Invalid(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
        TaskError::Provider(e @ ProviderError::InvalidConfig(_)) => {
            (StatusCode::BAD_REQUEST, "invalid_provider_config", e.to_string())
        }
        TaskError::Provider(e) => {
            tracing::error!("Provider error: {}", e);
            (StatusCode::BAD_GATEWAY, e.category(), e.to_string())
        }
        TaskError::Document(
            e @ (DocumentError::UnsupportedConversion { .. } | DocumentError::UnsupportedFormat(_)),
        ) => (StatusCode::BAD_REQUEST, "unsupported_document", e.to_string()),
        TaskError::Document(e) => {
            tracing::error!("Document error: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                "document_error",
                e.to_string(),
            )
        }
        TaskError::Io(e) => {
            tracing::error!("Task storage error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                "IO error".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(TaskError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (AppError::from(TaskError::NotReady(TaskStatus::Processing)), StatusCode::CONFLICT),
            (AppError::from(TaskError::Invalid("x".into())), StatusCode::BAD_REQUEST),
            (
                AppError::from(TaskError::Provider(ProviderError::InvalidConfig("x".into()))),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(TaskError::Document(DocumentError::UnsupportedConversion {
                    source_format: "pdf",
                    target: "epub",
                })),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_conflict_means_task_not_ready() {
        for status in [TaskStatus::Pending, TaskStatus::Processing, TaskStatus::Failed] {
            let (code, kind, _) = AppError::from(TaskError::NotReady(status)).parts();
            assert_eq!((code, kind), (StatusCode::CONFLICT, "not_ready"));
        }
    }
}
