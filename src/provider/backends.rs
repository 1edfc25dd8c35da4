//! Completion Backends
//!
//! Defines the provider trait and one implementation per wire schema.
//! Every implementation performs exactly one HTTP call per `complete()` and
//! maps failures into [`ProviderError`]; retrying is the caller's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};

use super::types::{CompletionRequest, ProviderConfig, ProviderError, ProviderKind};

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest error body excerpt kept in error messages
const MAX_ERROR_EXCERPT: usize = 300;

/// Extra keys that steer the custom backend instead of going into the body
const CUSTOM_CONTROL_KEYS: &[&str] = &["body_template", "response_path", "auth_header", "auth_prefix"];

/// Completion provider trait
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the provider type
    fn kind(&self) -> ProviderKind;

    /// Backend identity (kind + model) for cache keys
    fn fingerprint(&self) -> String;

    /// Run one completion and return plain text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Build the provider matching a validated configuration
pub fn build_provider(
    config: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    let backend = HttpBackend::new(config.clone(), timeout)?;
    let provider: Arc<dyn CompletionProvider> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider { backend }),
        ProviderKind::Claude => Arc::new(ClaudeProvider { backend }),
        ProviderKind::Gemini => Arc::new(GeminiProvider { backend }),
        ProviderKind::Ollama => Arc::new(OllamaProvider { backend }),
        ProviderKind::Custom => Arc::new(CustomProvider { backend }),
    };
    Ok(provider)
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

struct HttpBackend {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpBackend {
    fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> &str {
        &self.config.api_url
    }

    /// Send a JSON request and return the parsed JSON body of a 2xx reply
    async fn send_json(&self, request: RequestBuilder, body: &Value) -> Result<Value, ProviderError> {
        let response = request.json(body).send().await.map_err(map_transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(classify_status(status, &headers, &text));
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("Invalid JSON ({}): {}", e, excerpt(&text)))
        })?;

        // Some gateways answer 200 with an error envelope
        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let message = error_message(error).unwrap_or_else(|| error.to_string());
            return Err(classify_envelope(&message));
        }

        Ok(value)
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Transient(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        ProviderError::Transient(format!("Connection failed: {}", err))
    } else if err.is_decode() {
        ProviderError::MalformedResponse(format!("Failed to read body: {}", err))
    } else {
        ProviderError::Transient(format!("Request failed: {}", err))
    }
}

/// Map a non-2xx HTTP reply onto the error taxonomy
fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| error_message(&v))
        .unwrap_or_else(|| excerpt(body));
    let message = format!("{}: {}", status, message);

    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(message),
        429 => ProviderError::RateLimited {
            message,
            retry_after: parse_retry_after(headers),
        },
        408 | 500..=599 => ProviderError::Transient(message),
        code if is_quota_message(body) => {
            tracing::debug!(status = code, "Treating quota message as rate limit");
            ProviderError::RateLimited {
                message,
                retry_after: parse_retry_after(headers),
            }
        }
        code => ProviderError::Rejected {
            status: code,
            message,
        },
    }
}

fn classify_envelope(message: &str) -> ProviderError {
    if is_quota_message(message) {
        ProviderError::RateLimited {
            message: message.to_string(),
            retry_after: None,
        }
    } else if message.to_lowercase().contains("overloaded") {
        ProviderError::Transient(message.to_string())
    } else {
        ProviderError::MalformedResponse(format!("Error envelope: {}", message))
    }
}

fn is_quota_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("quota") || lower.contains("resource_exhausted") || lower.contains("rate limit")
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull a human-readable message out of the common error envelopes
fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("error")
            .and_then(error_message)
            .or_else(|| map.get("message").and_then(|m| m.as_str()).map(str::to_string)),
        _ => None,
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_ERROR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Trim the completion and drop reasoning sections some models emit
fn finish_text(text: &str) -> Result<String, ProviderError> {
    let mut output = text.to_string();
    while let Some(start) = output.find("<think>") {
        match output[start..].find("</think>") {
            Some(end) => output.replace_range(start..start + end + "</think>".len(), ""),
            None => output.truncate(start),
        }
    }

    let output = output.trim().to_string();
    if output.is_empty() {
        return Err(ProviderError::MalformedResponse("Empty completion".to_string()));
    }
    Ok(output)
}

/// Copy extra parameters into a JSON object without clobbering set fields
fn merge_extras(target: &mut Map<String, Value>, config: &ProviderConfig, skip: &[&str]) {
    for (key, raw) in &config.extra {
        if skip.contains(&key.as_str()) || target.contains_key(key) {
            continue;
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        target.insert(key.clone(), value);
    }
}

fn missing_field(field: &str, value: &Value) -> ProviderError {
    ProviderError::MalformedResponse(format!(
        "Missing {} in response: {}",
        field,
        excerpt(&value.to_string())
    ))
}

// ============================================================================
// OpenAI-compatible chat completions
// ============================================================================

pub struct OpenAiProvider {
    backend: HttpBackend,
}

impl OpenAiProvider {
    fn endpoint(&self) -> String {
        let url = self.backend.url();
        if url.ends_with("/chat/completions") {
            url.to_string()
        } else {
            format!("{}/chat/completions", url)
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn fingerprint(&self) -> String {
        self.backend.config.fingerprint()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let config = &self.backend.config;
        let mut body = json!({
            "model": config.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.text}
            ],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
            "stream": false
        });
        if let Some(map) = body.as_object_mut() {
            merge_extras(map, config, &[]);
        }

        let mut builder = self.backend.client.post(self.endpoint());
        if !config.api_key.is_empty() {
            builder = builder.bearer_auth(&config.api_key);
        }

        let response = self.backend.send_json(builder, &body).await?;
        let content = response
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing_field("choices[0].message.content", &response))?;

        finish_text(content)
    }
}

// ============================================================================
// Claude messages
// ============================================================================

pub struct ClaudeProvider {
    backend: HttpBackend,
}

impl ClaudeProvider {
    fn endpoint(&self) -> String {
        let url = self.backend.url();
        if url.ends_with("/messages") {
            url.to_string()
        } else if url.ends_with("/v1") {
            format!("{}/messages", url)
        } else {
            format!("{}/v1/messages", url)
        }
    }
}

#[async_trait]
impl CompletionProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn fingerprint(&self) -> String {
        self.backend.config.fingerprint()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let config = &self.backend.config;
        let mut body = json!({
            "model": config.model,
            "system": request.system,
            "messages": [{"role": "user", "content": request.text}],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature
        });
        if let Some(map) = body.as_object_mut() {
            merge_extras(map, config, &[]);
        }

        let builder = self
            .backend
            .client
            .post(self.endpoint())
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);

        let response = self.backend.send_json(builder, &body).await?;
        let blocks = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| missing_field("content", &response))?;

        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect();

        finish_text(&text)
    }
}

// ============================================================================
// Gemini generateContent
// ============================================================================

pub struct GeminiProvider {
    backend: HttpBackend,
}

impl GeminiProvider {
    fn endpoint(&self) -> String {
        let url = self.backend.url();
        if url.contains(":generateContent") {
            url.to_string()
        } else {
            format!("{}/v1beta/models/{}:generateContent", url, self.backend.config.model)
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn fingerprint(&self) -> String {
        self.backend.config.fingerprint()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let config = &self.backend.config;
        let mut generation = Map::new();
        generation.insert("temperature".to_string(), json!(config.temperature));
        generation.insert("maxOutputTokens".to_string(), json!(config.max_tokens));
        merge_extras(&mut generation, config, &[]);

        let body = json!({
            "systemInstruction": {"parts": [{"text": request.system}]},
            "contents": [{"role": "user", "parts": [{"text": request.text}]}],
            "generationConfig": Value::Object(generation)
        });

        let builder = self
            .backend
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &config.api_key);

        let response = self.backend.send_json(builder, &body).await?;

        if let Some(reason) = response
            .pointer("/promptFeedback/blockReason")
            .and_then(|v| v.as_str())
        {
            return Err(ProviderError::Rejected {
                status: 200,
                message: format!("Prompt blocked: {}", reason),
            });
        }

        let parts = response
            .pointer("/candidates/0/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| missing_field("candidates[0].content.parts", &response))?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();

        finish_text(&text)
    }
}

// ============================================================================
// Ollama generate
// ============================================================================

/// Ollama local model provider
pub struct OllamaProvider {
    backend: HttpBackend,
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn fingerprint(&self) -> String {
        self.backend.config.fingerprint()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let config = &self.backend.config;
        let url = format!("{}/api/generate", self.backend.url());

        let mut options = Map::new();
        options.insert("temperature".to_string(), json!(config.temperature));
        options.insert("num_predict".to_string(), json!(config.max_tokens));
        merge_extras(&mut options, config, &[]);

        let body = json!({
            "model": config.model,
            "prompt": request.text,
            "system": request.system,
            "stream": false,
            "options": Value::Object(options)
        });

        let response = self
            .backend
            .send_json(self.backend.client.post(&url), &body)
            .await?;

        let text = response
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing_field("response", &response))?;

        finish_text(text)
    }
}

// ============================================================================
// Custom schema
// ============================================================================

/// Backend described entirely by extra parameters:
/// - `body_template`: JSON with `{text}`, `{system}`, `{model}`, `{target_language}`
/// - `response_path`: dotted path to the translated text (default `translation`)
/// - `auth_header` / `auth_prefix`: where the API key goes
pub struct CustomProvider {
    backend: HttpBackend,
}

impl CustomProvider {
    fn build_body(&self, request: &CompletionRequest) -> Result<Value, ProviderError> {
        let config = &self.backend.config;

        if let Some(template) = config.extra.get("body_template") {
            let rendered = fill_template(
                template,
                &[
                    ("text", request.text.as_str()),
                    ("system", request.system.as_str()),
                    ("model", config.model.as_str()),
                    ("target_language", request.target_language.as_str()),
                ],
            );
            return serde_json::from_str(&rendered).map_err(|e| {
                ProviderError::InvalidConfig(format!("body_template is not valid JSON: {}", e))
            });
        }

        let mut body = Map::new();
        body.insert("text".to_string(), json!(request.text));
        body.insert("system".to_string(), json!(request.system));
        body.insert("target_language".to_string(), json!(request.target_language));
        if !config.model.is_empty() {
            body.insert("model".to_string(), json!(config.model));
        }
        merge_extras(&mut body, config, CUSTOM_CONTROL_KEYS);
        Ok(Value::Object(body))
    }
}

#[async_trait]
impl CompletionProvider for CustomProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    fn fingerprint(&self) -> String {
        self.backend.config.fingerprint()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let config = &self.backend.config;
        let body = self.build_body(request)?;

        let mut builder = self.backend.client.post(self.backend.url());
        if !config.api_key.is_empty() {
            let header = config
                .extra
                .get("auth_header")
                .map(String::as_str)
                .unwrap_or("Authorization");
            let prefix = config
                .extra
                .get("auth_prefix")
                .map(String::as_str)
                .unwrap_or("Bearer ");
            builder = builder.header(header, format!("{}{}", prefix, config.api_key));
        }

        let response = self.backend.send_json(builder, &body).await?;
        let path = config
            .extra
            .get("response_path")
            .map(String::as_str)
            .unwrap_or("translation");

        let text = lookup_path(&response, path)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing_field(path, &response))?;

        finish_text(text)
    }
}

/// A string JSON-escaped for splicing between quotes in a template
fn json_fragment(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Substitute `{name}` placeholders in one pass; substituted values are
/// JSON-escaped and never scanned again. Unknown names are left as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(&json_fragment(value));
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Follow a dotted path such as `data.translations.0.text`
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(segment),
            _ => None,
        })
}

// ============================================================================
// Tests
// ============================================================================
