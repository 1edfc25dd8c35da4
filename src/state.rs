//! Application state management

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TranslationCache;
use crate::config::Config;
use crate::provider::{HttpProviderFactory, ProviderFactory};
use crate::session::{SessionStore, SessionWorkspace};
use crate::tasks::{Orchestrator, PipelineSettings, TaskStore};
use crate::translate::RetryPolicy;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    sessions: SessionStore,
    workspace: SessionWorkspace,
    cache: TranslationCache,
    orchestrator: Orchestrator,
}

impl AppState {
    /// Build every store once, with real HTTP providers
    pub fn new(config: Config) -> Self {
        let providers = Arc::new(HttpProviderFactory::new(config.translation.provider_timeout()));
        Self::with_providers(config, providers)
    }

    /// Build the state around a given provider factory
    pub fn with_providers(config: Config, providers: Arc<dyn ProviderFactory>) -> Self {
        let sessions = SessionStore::new(config.session.timeout());
        let workspace = SessionWorkspace::new(&config.storage.data_dir);
        let cache = TranslationCache::new(
            config.storage.cache_dir.clone(),
            config.storage.cache_memory_entries,
        );

        let settings = PipelineSettings {
            retry: RetryPolicy {
                attempts: config.translation.retry_attempts,
                base_delay: config.translation.retry_base_delay(),
            },
            inter_call_delay: config.translation.inter_call_delay(),
            integrity_threshold: config.translation.integrity_threshold,
        };
        let orchestrator = Orchestrator::new(
            TaskStore::new(),
            cache.clone(),
            workspace.clone(),
            providers,
            settings,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                workspace,
                cache,
                orchestrator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    pub fn workspace(&self) -> &SessionWorkspace {
        &self.inner.workspace
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.inner.cache
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    pub fn tasks(&self) -> &TaskStore {
        self.inner.orchestrator.tasks()
    }

    /// Delete a session together with its tasks and files
    pub async fn purge_session(&self, token: &str) {
        let tasks = self.tasks().remove_session(token).await;
        if let Err(e) = self.workspace().remove_session(token).await {
            tracing::warn!(error = %e, "Failed to remove session directory");
        }
        tracing::debug!(tasks = tasks.len(), "Purged session data");
    }

    /// One sweep: expire sessions, then drop their data
    pub async fn sweep_sessions(&self) -> usize {
        let expired = self.sessions().sweep_expired().await;
        for token in &expired {
            self.purge_session(token).await;
        }
        expired.len()
    }

    /// Start the periodic session sweep
    pub fn start_sweep_task(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = self.config().session.sweep_interval().max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let swept = state.sweep_sessions().await;
                if swept > 0 {
                    tracing::info!(swept, "Session sweep finished");
                }
            }
        })
    }
}
