//! Scripted providers for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{CompletionProvider, CompletionRequest, ProviderConfig, ProviderError, ProviderFactory, ProviderKind};

type Script = dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync;

/// Provider answering from a closure and counting calls
pub struct ScriptedProvider {
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    /// Answers `[tl] <text>` for every request
    pub fn tagging() -> Arc<Self> {
        Self::new(|req| Ok(format!("[{}] {}", req.target_language, req.text)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    fn fingerprint(&self) -> String {
        "scripted:test".to_string()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(request)
    }
}

/// Factory handing out one shared scripted provider
pub struct StubFactory {
    pub provider: Arc<ScriptedProvider>,
}

impl StubFactory {
    pub fn new(provider: Arc<ScriptedProvider>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

impl ProviderFactory for StubFactory {
    fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        Ok(self.provider.clone())
    }
}
