//! Session token generation
//!
//! Tokens are 32 bytes from the OS CSPRNG, base64url-encoded. When the OS
//! source fails, a hash of host, time, process id and a counter is used
//! instead and the token is marked as degraded.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Raw token length (256 bits)
pub const TOKEN_BYTES: usize = 32;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A freshly generated token
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    pub value: String,
    /// True when the secure random source was unavailable
    pub degraded: bool,
}

/// Generate a new session token
pub fn generate_token() -> GeneratedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => GeneratedToken {
            value: URL_SAFE_NO_PAD.encode(bytes),
            degraded: false,
        },
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Secure random source unavailable, issuing degraded session token"
            );
            GeneratedToken {
                value: URL_SAFE_NO_PAD.encode(fallback_bytes()),
                degraded: true,
            }
        }
    }
}

/// Deterministic fallback: SHA-256 over host, time, pid and a counter
fn fallback_bytes() -> [u8; TOKEN_BYTES] {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default();
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(counter.to_le_bytes());

    let digest = hasher.finalize();
    let mut bytes = [0u8; TOKEN_BYTES];
    bytes.copy_from_slice(&digest);
    bytes
}

/// Quick shape check before a map lookup
pub fn looks_like_token(value: &str) -> bool {
    value.len() == 43
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert!(!token.degraded);
        assert!(looks_like_token(&token.value));
        let decoded = URL_SAFE_NO_PAD.decode(&token.value).unwrap();
        assert_eq!(decoded.len(), TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..256).map(|_| generate_token().value).collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn test_fallback_varies() {
        assert_ne!(fallback_bytes(), fallback_bytes());
    }

    #[test]
    fn test_looks_like_token_rejects_garbage() {
        assert!(!looks_like_token(""));
        assert!(!looks_like_token("short"));
        assert!(!looks_like_token(&"!".repeat(43)));
    }
}
