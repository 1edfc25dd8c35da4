//! Task Types

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::document::{DocumentError, DocumentFormat, GenerateMode, IntegrityReport, OutputFormat};
use crate::provider::{ProviderConfig, ProviderError, ProviderKind};

/// Task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and failed tasks never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Per-block outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockStats {
    pub total: usize,
    /// Translated by a provider call
    pub translated: usize,
    /// Served from the translation cache
    pub cached: usize,
    /// Provider failed; original text kept
    pub kept_original: usize,
    /// No letters, nothing to translate
    pub skipped: usize,
}

impl BlockStats {
    pub fn completed(&self) -> usize {
        self.translated + self.cached + self.kept_original + self.skipped
    }
}

/// A translation job owned by one session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    /// Owning session token
    #[serde(skip)]
    pub session: String,

    pub filename: String,
    pub source_format: DocumentFormat,
    pub output_format: OutputFormat,
    pub target_language: String,
    pub mode: GenerateMode,
    pub provider: ProviderKind,
    pub model: String,

    pub status: TaskStatus,
    /// Fraction of blocks processed, never decreases
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub output_path: Option<PathBuf>,

    /// Output came from the text-only fallback
    pub degraded: bool,
    pub warnings: Vec<String>,
    pub stats: BlockStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityReport>,
}

impl Task {
    pub fn new(
        session: &str,
        filename: &str,
        source_format: DocumentFormat,
        output_format: OutputFormat,
        target_language: &str,
        mode: GenerateMode,
        provider: &ProviderConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session: session.to_string(),
            filename: filename.to_string(),
            source_format,
            output_format,
            target_language: target_language.to_string(),
            mode,
            provider: provider.kind,
            model: provider.model.clone(),
            status: TaskStatus::Pending,
            progress: 0.0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output_path: None,
            degraded: false,
            warnings: Vec::new(),
            stats: BlockStats::default(),
            integrity: None,
        }
    }

    /// File name offered on download: `<stem>.<lang>.<ext>`
    pub fn output_filename(&self) -> String {
        let stem = match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.filename.as_str(),
        };
        let stem = if stem.is_empty() { "document" } else { stem };
        format!("{}.{}.{}", stem, self.target_language, self.output_format.extension())
    }
}

/// What a visitor submits
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub target_language: String,
    pub provider: ProviderConfig,
    pub mode: GenerateMode,
    /// Requested output extension or file name; empty follows the source
    pub output_format: Option<String>,
    pub style_hint: String,
    pub force_retranslate: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Task is {} and has no output yet", .0.as_str())]
    NotReady(TaskStatus),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(filename: &str) -> Task {
        Task::new(
            "session",
            filename,
            DocumentFormat::Epub,
            OutputFormat::Pdf,
            "fr",
            GenerateMode::Bilingual,
            &ProviderConfig::new(ProviderKind::Ollama, "qwen2.5"),
        )
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(task("moby dick.epub").output_filename(), "moby dick.fr.pdf");
        assert_eq!(task("noext").output_filename(), "noext.fr.pdf");
        assert_eq!(task(".epub").output_filename(), ".epub.fr.pdf");
    }

    #[test]
    fn test_snapshot_hides_session_and_paths() {
        let json = serde_json::to_value(task("a.epub")).unwrap();
        assert!(json.get("session").is_none());
        assert!(json.get("outputPath").is_none());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["provider"], "ollama");
        assert_eq!(json["stats"]["keptOriginal"], 0);
    }
}
