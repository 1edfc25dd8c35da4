//! Translation Client
//!
//! `translate(text, target_language, hint)` composed from the cache and one
//! provider, with bounded retries for transient failures.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, TranslationCache};
use crate::provider::{CompletionProvider, CompletionRequest, ProviderError};

use super::prompt::{needs_translation, system_prompt};

/// Longest wait honored from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Attempt count and backoff between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub attempts: u32,
    /// Delay after the first failure, doubled after each further one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following failure number `failure` (0-based)
    pub fn delay(&self, failure: u32, error: &ProviderError) -> Duration {
        let backoff = self.base_delay.saturating_mul(1u32 << failure.min(16));
        match error {
            ProviderError::RateLimited {
                retry_after: Some(after),
                ..
            } => backoff.max((*after).min(MAX_RETRY_AFTER)),
            _ => backoff,
        }
    }
}

/// Where a translation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Provider,
    Cache,
    /// No letters, returned unchanged
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub origin: Origin,
}

impl Translation {
    pub fn from_cache(&self) -> bool {
        self.origin == Origin::Cache
    }

    /// Whether this result cost a provider call
    pub fn called_provider(&self) -> bool {
        self.origin == Origin::Provider
    }
}

/// Cache-backed translator bound to one provider
#[derive(Clone)]
pub struct Translator {
    provider: Arc<dyn CompletionProvider>,
    cache: TranslationCache,
    policy: RetryPolicy,
    force: bool,
}

impl Translator {
    pub fn new(provider: Arc<dyn CompletionProvider>, cache: TranslationCache, policy: RetryPolicy) -> Self {
        Self {
            provider,
            cache,
            policy,
            force: false,
        }
    }

    /// Skip cache lookups; results still overwrite cached values
    pub fn force_retranslate(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        hint: &str,
    ) -> Result<Translation, ProviderError> {
        if !needs_translation(text) {
            return Ok(Translation {
                text: text.to_string(),
                origin: Origin::Passthrough,
            });
        }

        let key = CacheKey::derive(text, target_language, &self.provider.fingerprint(), hint);

        if !self.force {
            if let Some(cached) = self.cache.get(&key).await {
                tracing::trace!(digest = %key.digest, "Translation cache hit");
                return Ok(Translation {
                    text: cached,
                    origin: Origin::Cache,
                });
            }
        }

        let request = CompletionRequest {
            text: key.text.clone(),
            system: system_prompt(target_language, hint),
            target_language: target_language.to_string(),
        };

        let translated = self.complete_with_retry(&request).await?;

        if let Err(e) = self.cache.put(&key, &translated).await {
            tracing::warn!(digest = %key.digest, error = %e, "Failed to write translation cache");
        }

        Ok(Translation {
            text: translated,
            origin: Origin::Provider,
        })
    }

    async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let attempts = self.policy.attempts.max(1);
        let mut failure = 0;

        loop {
            match self.provider.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && failure + 1 < attempts => {
                    let wait = self.policy.delay(failure, &e);
                    tracing::warn!(
                        provider = self.provider.kind().as_str(),
                        attempt = failure + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    failure += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.provider.kind().as_str(),
                        attempts = failure + 1,
                        category = e.category(),
                        error = %e,
                        "Provider call failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
