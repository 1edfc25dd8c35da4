//! Translation Routes
//!
//! Endpoints:
//! - POST /api/v1/translate - Submit a document (multipart), returns 202

use std::collections::BTreeMap;

use axum::{
    extract::{DefaultBodyLimit, Extension, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::document::GenerateMode;
use crate::error::{AppError, Result};
use crate::provider::{ProviderConfig, ProviderKind};
use crate::state::AppState;
use crate::tasks::TaskRequest;

use super::session::CurrentSession;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub task_id: Uuid,
}

/// Raw multipart fields
#[derive(Debug, Default)]
struct SubmitForm {
    file: Option<(String, Vec<u8>)>,
    fields: BTreeMap<String, String>,
}

impl SubmitForm {
    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(|s| s.trim()).unwrap_or("")
    }

    fn flag(&self, name: &str) -> bool {
        matches!(
            self.text(name).to_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        )
    }

    fn parse<T: std::str::FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.text(name) {
            "" => Ok(default),
            value => value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, value))),
        }
    }

    fn provider_config(&self) -> Result<ProviderConfig> {
        let kind_name = match self.text("provider") {
            "" => "openai",
            name => name,
        };
        let kind = ProviderKind::parse(kind_name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown provider: {}", kind_name)))?;

        let mut config = ProviderConfig::new(kind, self.text("model")).with_api_key(self.text("api_key"));
        if !self.text("api_url").is_empty() {
            config = config.with_url(self.text("api_url"));
        }
        config.temperature = self.parse("temperature", config.temperature)?;
        config.max_tokens = self.parse("max_tokens", config.max_tokens)?;
        config.extra = parse_extra(self.text("extra_params"))?;
        Ok(config)
    }

    fn into_request(mut self) -> Result<TaskRequest> {
        let provider = self.provider_config()?;
        let mode = GenerateMode::parse(self.text("generate_mode")).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid generate_mode: {}", self.text("generate_mode")))
        })?;
        let (filename, bytes) = self
            .file
            .take()
            .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

        Ok(TaskRequest {
            filename,
            bytes,
            target_language: self.text("target_language").to_string(),
            provider,
            mode,
            output_format: Some(self.text("output_format").to_string()).filter(|s| !s.is_empty()),
            style_hint: self.text("style_hint").to_string(),
            force_retranslate: self.flag("force_retranslate"),
        })
    }
}

/// `extra_params`: a JSON object; non-string values keep their JSON text
fn parse_extra(raw: &str) -> Result<BTreeMap<String, String>> {
    if raw.is_empty() {
        return Ok(BTreeMap::new());
    }
    let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| AppError::BadRequest(format!("extra_params must be a JSON object: {}", e)))?;
    Ok(values
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// POST /api/v1/translate
async fn submit(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let mut form = SubmitForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" || name == "document" {
            let filename = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "document".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;
            tracing::debug!(filename = %filename, bytes = data.len(), "Received upload");
            form.file = Some((filename, data.to_vec()));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
            form.fields.insert(name, value);
        }
    }

    let request = form.into_request()?;
    let task_id = state.orchestrator().submit(&session.token, request).await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}
