//! Task Orchestrator
//!
//! Drives one task from upload to output:
//!
//! ```text
//! pending ─▶ processing ─▶ completed
//!                 │
//!                 └──────▶ failed
//! ```
//!
//! `submit()` validates and stores the upload, then spawns the pipeline on
//! its own tokio task: extraction and rebuild run on the blocking pool,
//! blocks are translated one after another in between.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::TranslationCache;
use crate::document::{
    integrity, open_document, DocumentError, DocumentFormat, IntegrityReport, OutputFormat,
    RebuildOptions, RebuildOutput, TranslatedBlock,
};
use crate::document::{GenerateMode, TextBlock};
use crate::provider::ProviderFactory;
use crate::session::SessionWorkspace;
use crate::translate::{Origin, RetryPolicy, Translator};

use super::store::TaskStore;
use super::types::{BlockStats, Task, TaskError, TaskRequest, TaskStatus};

/// Pipeline knobs shared by every task
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    /// Pause after each provider call
    pub inter_call_delay: Duration,
    pub integrity_threshold: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            inter_call_delay: Duration::ZERO,
            integrity_threshold: integrity::DEFAULT_THRESHOLD,
        }
    }
}

/// Everything the background run needs
struct Job {
    id: Uuid,
    source_path: PathBuf,
    dir: PathBuf,
    translator: Translator,
    target_language: String,
    hint: String,
    mode: GenerateMode,
    output_format: OutputFormat,
    title: String,
}

/// Result of a successful run
struct Outcome {
    output_path: PathBuf,
    output: RebuildOutput,
    integrity: Option<IntegrityReport>,
    warnings: Vec<String>,
}

#[derive(Clone)]
pub struct Orchestrator {
    tasks: TaskStore,
    cache: TranslationCache,
    workspace: SessionWorkspace,
    providers: Arc<dyn ProviderFactory>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        tasks: TaskStore,
        cache: TranslationCache,
        workspace: SessionWorkspace,
        providers: Arc<dyn ProviderFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tasks,
            cache,
            workspace,
            providers,
            settings,
        }
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    /// Validate a request, record a pending task and start it.
    ///
    /// Errors here happen before any task exists.
    pub async fn submit(&self, session: &str, request: TaskRequest) -> Result<Uuid, TaskError> {
        let target_language = request.target_language.trim().to_string();
        if target_language.is_empty() {
            return Err(TaskError::Invalid("target_language is required".to_string()));
        }
        if request.bytes.is_empty() {
            return Err(TaskError::Invalid("Uploaded file is empty".to_string()));
        }

        let source_format = DocumentFormat::from_magic_bytes(&request.bytes).ok_or_else(|| {
            TaskError::Invalid("Unsupported document format. Only PDF and EPUB are supported.".to_string())
        })?;

        let (output_format, format_warning) =
            OutputFormat::resolve(request.output_format.as_deref(), source_format);
        if source_format == DocumentFormat::Pdf && output_format == OutputFormat::Epub {
            return Err(DocumentError::UnsupportedConversion {
                source_format: "pdf",
                target: "epub",
            }
            .into());
        }

        let provider_config = request.provider.validate()?;
        let provider = self.providers.create(&provider_config)?;

        let mut task = Task::new(
            session,
            &request.filename,
            source_format,
            output_format,
            &target_language,
            request.mode,
            &provider_config,
        );
        task.warnings.extend(format_warning);
        let id = task.id;

        let dir = self.workspace.prepare_task_dir(session, id).await?;
        let source_path = dir.join(format!("source.{}", source_format.extension()));
        tokio::fs::write(&source_path, &request.bytes).await?;

        let title = match request.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => request.filename.clone(),
        };

        let job = Job {
            id,
            source_path,
            dir,
            translator: Translator::new(provider, self.cache.clone(), self.settings.retry)
                .force_retranslate(request.force_retranslate),
            target_language,
            hint: request.style_hint.trim().to_string(),
            mode: request.mode,
            output_format,
            title,
        };

        tracing::info!(
            task_id = %id,
            format = source_format.extension(),
            output = output_format.extension(),
            provider = provider_config.kind.as_str(),
            bytes = request.bytes.len(),
            "Task submitted"
        );

        self.tasks.insert(task).await;

        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run(job).await });

        Ok(id)
    }

    async fn run(self, job: Job) {
        let id = job.id;
        self.tasks
            .update(id, |task| {
                task.status = TaskStatus::Processing;
                task.started_at = Some(Utc::now());
            })
            .await;

        match self.execute(&job).await {
            Ok(outcome) => {
                tracing::info!(
                    task_id = %id,
                    degraded = outcome.output.degraded,
                    warnings = outcome.warnings.len() + outcome.output.warnings.len(),
                    "Task completed"
                );
                self.tasks
                    .update(id, |task| {
                        task.status = TaskStatus::Completed;
                        task.progress = 1.0;
                        task.completed_at = Some(Utc::now());
                        task.output_path = Some(outcome.output_path);
                        task.degraded = outcome.output.degraded;
                        task.warnings.extend(outcome.output.warnings);
                        task.warnings.extend(outcome.warnings);
                        task.integrity = outcome.integrity;
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Task failed");
                self.tasks
                    .update(id, |task| {
                        task.status = TaskStatus::Failed;
                        task.error = Some(e.to_string());
                        task.completed_at = Some(Utc::now());
                    })
                    .await;
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<Outcome, TaskError> {
        let bytes = tokio::fs::read(&job.source_path).await?;

        let (doc, blocks) = tokio::task::spawn_blocking(move || {
            let doc = open_document(bytes)?;
            let blocks = doc.extract_blocks()?;
            Ok::<_, DocumentError>((doc, blocks))
        })
        .await
        .map_err(DocumentError::from)??;

        if blocks.is_empty() {
            return Err(DocumentError::NoTranslatableText.into());
        }
        tracing::debug!(task_id = %job.id, blocks = blocks.len(), "Extracted text blocks");

        let mut warnings = Vec::new();
        let translated = self.translate_blocks(job, blocks, &mut warnings).await;

        let options = RebuildOptions {
            mode: job.mode,
            output_format: job.output_format,
            target_language: job.target_language.clone(),
            title: job.title.clone(),
        };
        let threshold = self.settings.integrity_threshold;

        let (output, report) = tokio::task::spawn_blocking(move || {
            let output = doc.rebuild(&translated, &options)?;
            let report = integrity::check(
                &output.bytes,
                options.output_format,
                &translated,
                options.mode,
                threshold,
            );
            Ok::<_, DocumentError>((output, report))
        })
        .await
        .map_err(DocumentError::from)??;

        let integrity = match report {
            Ok(report) => {
                if !report.passed {
                    warnings.push(format!(
                        "Integrity check recovered {} of {} text fragments ({:.0}%, expected at least {:.0}%)",
                        report.recovered,
                        report.expected,
                        report.ratio * 100.0,
                        report.threshold * 100.0
                    ));
                }
                Some(report)
            }
            Err(e) => {
                warnings.push(format!("Integrity check could not read the output: {}", e));
                None
            }
        };

        let output_path = job
            .dir
            .join(format!("output.{}", job.output_format.extension()));
        tokio::fs::write(&output_path, &output.bytes).await?;

        Ok(Outcome {
            output_path,
            output,
            integrity,
            warnings,
        })
    }

    /// Translate blocks in order. Provider failures keep the original text.
    async fn translate_blocks(
        &self,
        job: &Job,
        blocks: Vec<TextBlock>,
        warnings: &mut Vec<String>,
    ) -> Vec<TranslatedBlock> {
        let mut stats = BlockStats {
            total: blocks.len(),
            ..Default::default()
        };
        self.tasks.record_progress(job.id, &stats).await;

        let mut last_error = None;
        let mut translated = Vec::with_capacity(blocks.len());

        for block in blocks {
            let result = job
                .translator
                .translate(&block.text, &job.target_language, &job.hint)
                .await;

            let called_provider = match &result {
                Ok(t) => t.called_provider(),
                Err(_) => true,
            };

            let translation = match result {
                Ok(t) => {
                    match t.origin {
                        Origin::Provider => stats.translated += 1,
                        Origin::Cache => stats.cached += 1,
                        Origin::Passthrough => stats.skipped += 1,
                    }
                    (t.origin != Origin::Passthrough).then_some(t.text)
                }
                Err(e) => {
                    tracing::warn!(
                        task_id = %job.id,
                        block = block.index,
                        category = e.category(),
                        error = %e,
                        "Keeping original text for block"
                    );
                    stats.kept_original += 1;
                    last_error = Some(e);
                    None
                }
            };

            translated.push(TranslatedBlock::new(block, translation));
            self.tasks.record_progress(job.id, &stats).await;

            if called_provider && !self.settings.inter_call_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_call_delay).await;
            }
        }

        if let Some(e) = last_error {
            warnings.push(format!(
                "{} of {} blocks kept their original text (last error: {})",
                stats.kept_original, stats.total, e
            ));
        }

        translated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use tempfile::TempDir;

    use crate::formats::fixtures::{sample_epub, sample_pdf, sample_pdf_with_content, MALFORMED_CONTENT};
    use crate::provider::mock::{ScriptedProvider, StubFactory};
    use crate::provider::{ProviderConfig, ProviderError, ProviderKind};

    struct Harness {
        _dir: TempDir,
        orchestrator: Orchestrator,
    }

    fn harness(provider: Arc<ScriptedProvider>) -> Harness {
        let dir = TempDir::new().unwrap();
        let settings = PipelineSettings {
            retry: RetryPolicy {
                attempts: 3,
                base_delay: StdDuration::ZERO,
            },
            ..Default::default()
        };
        let orchestrator = Orchestrator::new(
            TaskStore::new(),
            TranslationCache::new(dir.path().join("cache"), 100),
            SessionWorkspace::new(dir.path()),
            StubFactory::new(provider),
            settings,
        );
        Harness {
            _dir: dir,
            orchestrator,
        }
    }

    fn request(filename: &str, bytes: Vec<u8>) -> TaskRequest {
        TaskRequest {
            filename: filename.to_string(),
            bytes,
            target_language: "fr".to_string(),
            provider: ProviderConfig::new(ProviderKind::Ollama, "qwen2.5"),
            mode: GenerateMode::Bilingual,
            output_format: None,
            style_hint: String::new(),
            force_retranslate: false,
        }
    }

    async fn wait_for(orchestrator: &Orchestrator, session: &str, id: Uuid) -> Task {
        for _ in 0..500 {
            let task = orchestrator.tasks().get(session, id).await.unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("task {} did not finish", id);
    }

    #[tokio::test]
    async fn test_block_timeout_keeps_original() {
        let provider = ScriptedProvider::new(|req| {
            if req.text == "Third block" {
                Err(ProviderError::Transient("timed out".to_string()))
            } else {
                Ok(format!("FR {}", req.text))
            }
        });
        let h = harness(provider.clone());
        let epub = sample_epub(&[&["First block", "Second block", "Third block"]]);

        let id = h.orchestrator.submit("s1", request("book.epub", epub)).await.unwrap();
        let task = wait_for(&h.orchestrator, "s1", id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert_eq!(task.stats.translated, 2);
        assert_eq!(task.stats.kept_original, 1);
        // two successes plus three attempts for the failing block
        assert_eq!(provider.calls(), 5);
        assert!(task.warnings.iter().any(|w| w.contains("kept their original text")));

        let output = tokio::fs::read(task.output_path.unwrap()).await.unwrap();
        let text = integrity::output_text(&output, OutputFormat::Epub).unwrap();
        assert!(text.contains("FR First block"));
        assert!(text.contains("FR Second block"));
        assert!(text.contains("Third block"));
        assert!(!text.contains("FR Third block"));
    }

    #[tokio::test]
    async fn test_resubmission_uses_cache() {
        let provider = ScriptedProvider::tagging();
        let h = harness(provider.clone());
        let epub = sample_epub(&[&["Alpha", "Beta"], &["Gamma"]]);

        let first = h.orchestrator.submit("s1", request("a.epub", epub.clone())).await.unwrap();
        wait_for(&h.orchestrator, "s1", first).await;
        assert_eq!(provider.calls(), 3);

        let second = h.orchestrator.submit("s1", request("a.epub", epub)).await.unwrap();
        let task = wait_for(&h.orchestrator, "s1", second).await;

        assert_eq!(provider.calls(), 3, "identical resubmission must not call the provider");
        assert_eq!(task.stats.cached, 3);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_overlapping_document_calls_less() {
        let provider = ScriptedProvider::tagging();
        let h = harness(provider.clone());

        let first = h
            .orchestrator
            .submit("s1", request("a.epub", sample_epub(&[&["Shared one", "Shared two"]])))
            .await
            .unwrap();
        wait_for(&h.orchestrator, "s1", first).await;
        let before = provider.calls();

        let second = h
            .orchestrator
            .submit(
                "s1",
                request("b.epub", sample_epub(&[&["Shared one", "Shared two", "Brand new"]])),
            )
            .await
            .unwrap();
        let task = wait_for(&h.orchestrator, "s1", second).await;

        assert_eq!(provider.calls() - before, 1);
        assert!(provider.calls() - before < task.stats.total);
    }

    #[tokio::test]
    async fn test_force_retranslate_bypasses_cache() {
        let provider = ScriptedProvider::tagging();
        let h = harness(provider.clone());
        let epub = sample_epub(&[&["Alpha"]]);

        let first = h.orchestrator.submit("s1", request("a.epub", epub.clone())).await.unwrap();
        wait_for(&h.orchestrator, "s1", first).await;

        let mut forced = request("a.epub", epub);
        forced.force_retranslate = true;
        let second = h.orchestrator.submit("s1", forced).await.unwrap();
        wait_for(&h.orchestrator, "s1", second).await;

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_tasks_are_isolated_between_sessions() {
        let h = harness(ScriptedProvider::tagging());

        let id = h
            .orchestrator
            .submit("alice", request("a.epub", sample_epub(&[&["Hello"]])))
            .await
            .unwrap();
        wait_for(&h.orchestrator, "alice", id).await;

        assert!(matches!(
            h.orchestrator.tasks().get("bob", id).await,
            Err(TaskError::NotFound(_))
        ));
        assert!(h.orchestrator.tasks().list("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_content_falls_back_to_text_layout() {
        let h = harness(ScriptedProvider::tagging());
        let pdf = sample_pdf_with_content(MALFORMED_CONTENT);

        let id = h.orchestrator.submit("s1", request("malformed.pdf", pdf)).await.unwrap();
        let task = wait_for(&h.orchestrator, "s1", id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.degraded);
        assert!(task.warnings.iter().any(|w| w.contains("text-only")));

        let output = tokio::fs::read(task.output_path.unwrap()).await.unwrap();
        let text = integrity::output_text(&output, OutputFormat::Pdf).unwrap();
        assert!(text.contains("[fr] Hello world"));
    }

    #[tokio::test]
    async fn test_pdf_bilingual_integrity() {
        let h = harness(ScriptedProvider::tagging());
        let pdf = sample_pdf(&[&["It was a dark night"], &["The end"]]);

        let id = h.orchestrator.submit("s1", request("story.pdf", pdf)).await.unwrap();
        let task = wait_for(&h.orchestrator, "s1", id).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert!(!task.degraded);
        assert!(task.integrity.unwrap().passed);
    }

    #[tokio::test]
    async fn test_no_text_fails_task() {
        let h = harness(ScriptedProvider::tagging());

        let id = h
            .orchestrator
            .submit("s1", request("digits.epub", sample_epub(&[&["1234"]])))
            .await
            .unwrap();
        let task = wait_for(&h.orchestrator, "s1", id).await;

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("No translatable text"));
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let h = harness(ScriptedProvider::tagging());

        let not_a_document = h.orchestrator.submit("s1", request("a.txt", b"hello".to_vec())).await;
        assert!(matches!(not_a_document, Err(TaskError::Invalid(_))));

        let mut no_language = request("a.epub", sample_epub(&[&["Hello"]]));
        no_language.target_language = "  ".to_string();
        assert!(matches!(
            h.orchestrator.submit("s1", no_language).await,
            Err(TaskError::Invalid(_))
        ));

        let mut pdf_to_epub = request("a.pdf", sample_pdf(&[&["Hello"]]));
        pdf_to_epub.output_format = Some("epub".to_string());
        assert!(matches!(
            h.orchestrator.submit("s1", pdf_to_epub).await,
            Err(TaskError::Document(DocumentError::UnsupportedConversion { .. }))
        ));

        let mut no_key = request("a.epub", sample_epub(&[&["Hello"]]));
        no_key.provider = ProviderConfig::new(ProviderKind::OpenAi, "gpt-4o-mini");
        assert!(matches!(
            h.orchestrator.submit("s1", no_key).await,
            Err(TaskError::Provider(ProviderError::InvalidConfig(_)))
        ));

        assert_eq!(h.orchestrator.tasks().len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_output_extension_is_recorded() {
        let h = harness(ScriptedProvider::tagging());
        let mut req = request("a.epub", sample_epub(&[&["Hello"]]));
        req.output_format = Some("docx".to_string());

        let id = h.orchestrator.submit("s1", req).await.unwrap();
        let task = wait_for(&h.orchestrator, "s1", id).await;

        assert_eq!(task.output_format, OutputFormat::Pdf);
        assert!(task.warnings.iter().any(|w| w.contains("docx")));
    }
}
