//! Provider Module
//!
//! Normalizes AI text-completion endpoints behind one `complete()` contract.
//!
//! Supported wire schemas:
//! - Chat completions (OpenAI and compatible servers)
//! - Messages (Claude)
//! - generateContent (Gemini)
//! - Local generate (Ollama)
//! - Custom JSON schema driven by extra parameters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitext_server::provider::{build_provider, CompletionRequest, ProviderConfig, ProviderKind};
//!
//! let config = ProviderConfig::new(ProviderKind::Ollama, "qwen2.5").validate()?;
//! let provider = build_provider(&config, Duration::from_secs(120))?;
//! let text = provider.complete(&request).await?;
//! ```

mod backends;
mod types;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

pub use backends::{build_provider, CompletionProvider};
pub use types::{CompletionRequest, ProviderConfig, ProviderError, ProviderKind};

/// Builds providers for submitted tasks
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError>;
}

/// Factory producing real HTTP backends
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    timeout: Duration,
}

impl HttpProviderFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        build_provider(config, self.timeout)
    }
}
