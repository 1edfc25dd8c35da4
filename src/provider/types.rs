//! Provider Types
//!
//! Backend-independent request, configuration and error types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Supported completion backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Chat-completions style (OpenAI and compatible servers)
    OpenAi,
    /// Messages style (Claude)
    Claude,
    /// generateContent style (Gemini)
    Gemini,
    /// Local generate style (Ollama)
    Ollama,
    /// User-described JSON schema
    Custom,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Parse a kind from a form value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "chatgpt" | "deepseek" | "openai-compatible" => Some(Self::OpenAi),
            "claude" | "anthropic" => Some(Self::Claude),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Endpoint used when the caller leaves the URL empty
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Claude => Some("https://api.anthropic.com"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com"),
            Self::Ollama => Some("http://localhost:11434"),
            Self::Custom => None,
        }
    }

    fn requires_api_key(&self) -> bool {
        matches!(self, Self::Claude | Self::Gemini)
    }
}

/// Provider configuration, fixed for the lifetime of a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Never serialized back to clients
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Free-form parameters, mostly for `custom` backends
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: String::new(),
            api_url: kind.default_url().unwrap_or_default().to_string(),
            model: model.into(),
            temperature: 0.3,
            max_tokens: 4096,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Fill defaults and reject unusable settings
    pub fn validate(mut self) -> Result<Self, ProviderError> {
        if self.api_url.trim().is_empty() {
            self.api_url = self
                .kind
                .default_url()
                .ok_or_else(|| ProviderError::InvalidConfig("API URL is required".to_string()))?
                .to_string();
        }
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();

        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| ProviderError::InvalidConfig(format!("Invalid API URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidConfig(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        if self.model.trim().is_empty() && self.kind != ProviderKind::Custom {
            return Err(ProviderError::InvalidConfig("Model name is required".to_string()));
        }
        if self.kind.requires_api_key() && self.api_key.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(format!(
                "API key is required for {}",
                self.kind.as_str()
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ProviderError::InvalidConfig(format!(
                "Temperature out of range: {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ProviderError::InvalidConfig("max_tokens must be positive".to_string()));
        }

        Ok(self)
    }

    /// Backend identity used in cache keys
    pub fn fingerprint(&self) -> String {
        match self.kind {
            // The same model name can mean different things on different custom endpoints
            ProviderKind::Custom => format!("custom:{}:{}", self.api_url, self.model),
            kind => format!("{}:{}", kind.as_str(), self.model),
        }
    }
}

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Text to translate (user turn)
    pub text: String,
    /// Instructions (system turn)
    pub system: String,
    /// Target language, for schemas that take it as a field
    pub target_language: String,
}

/// Uniform provider error taxonomy
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transient provider failure: {0}")]
    Transient(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Short machine-readable category
    pub fn category(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::RateLimited { .. } => "rate_limited",
            Self::Transient(_) => "transient",
            Self::Rejected { .. } => "rejected",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}
