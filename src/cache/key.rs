//! Cache key derivation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content-addressed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    /// SHA-256 hex digest
    pub digest: String,
    /// Normalized source text
    pub text: String,
    pub target_language: String,
    /// Backend identity plus prompt hint
    pub backend: String,
}

impl CacheKey {
    /// Derive the key for a (text, target language, backend, hint) tuple.
    ///
    /// Text is trimmed and internal whitespace collapsed, so reflowed copies
    /// of the same paragraph share an entry.
    pub fn derive(text: &str, target_language: &str, fingerprint: &str, hint: &str) -> Self {
        let text = normalize_text(text);
        let target_language = target_language.trim().to_string();
        let hint = hint.trim();
        let backend = if hint.is_empty() {
            fingerprint.to_string()
        } else {
            format!("{}|{}", fingerprint, hint)
        };

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        hasher.update(target_language.as_bytes());
        hasher.update([0u8]);
        hasher.update(fingerprint.as_bytes());
        hasher.update([0u8]);
        hasher.update(hint.as_bytes());

        Self {
            digest: hex::encode(hasher.finalize()),
            text,
            target_language,
            backend,
        }
    }

    /// Shard directory name
    pub fn shard(&self) -> &str {
        &self.digest[..2]
    }
}

/// Trim and collapse runs of whitespace into single spaces
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
