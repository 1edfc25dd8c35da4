//! Session Store
//!
//! Manages visitor sessions with:
//! - In-memory session map behind a single lock
//! - Inactivity expiry (last-seen + timeout)
//! - Periodic sweeping of expired sessions

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::token::{generate_token, looks_like_token};

// ============================================================================
// Session
// ============================================================================

/// A visitor session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque token, also the cookie value
    #[serde(skip_serializing)]
    pub token: String,

    pub created_at: DateTime<Utc>,

    pub last_seen: DateTime<Utc>,

    /// Token came from the non-cryptographic fallback
    pub degraded_token: bool,
}

impl Session {
    fn new() -> Self {
        let generated = generate_token();
        let now = Utc::now();
        Self {
            token: generated.value,
            created_at: now,
            last_seen: now,
            degraded_token: generated.degraded,
        }
    }

    /// Whether the session has been idle for at least `timeout`
    pub fn is_expired(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_seen >= timeout
    }
}

/// Outcome of [`SessionStore::resolve`]
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    /// A new session was issued; the caller must set the cookie
    pub created: bool,
}

// ============================================================================
// Session Store
// ============================================================================

/// Thread-safe session map
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    /// Sessions indexed by token
    sessions: RwLock<HashMap<String, Session>>,

    /// Inactivity window
    timeout: Duration,
}

impl SessionStore {
    /// Create a new store with the given inactivity timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                timeout,
            }),
        }
    }

    /// Session timeout
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Resolve a token to a live session, issuing a new one when the token is
    /// missing, unknown or expired.
    pub async fn resolve(&self, token: Option<&str>) -> ResolvedSession {
        let now = Utc::now();
        let mut sessions = self.inner.sessions.write().await;

        if let Some(token) = token.filter(|t| looks_like_token(t)) {
            match sessions.get_mut(token) {
                Some(session) if !session.is_expired(self.inner.timeout, now) => {
                    session.last_seen = now;
                    return ResolvedSession {
                        session: session.clone(),
                        created: false,
                    };
                }
                Some(_) => {
                    sessions.remove(token);
                    tracing::debug!("Dropped expired session on access");
                }
                None => {}
            }
        }

        let session = Session::new();
        sessions.insert(session.token.clone(), session.clone());

        tracing::info!(
            degraded_token = session.degraded_token,
            active_sessions = sessions.len(),
            "Created visitor session"
        );

        ResolvedSession {
            session,
            created: true,
        }
    }

    /// Read-only lookup; never creates or refreshes
    pub async fn lookup(&self, token: &str) -> Option<Session> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| !s.is_expired(self.inner.timeout, Utc::now()))
            .cloned()
    }

    /// Delete a session explicitly
    pub async fn remove(&self, token: &str) -> Option<Session> {
        let removed = self.inner.sessions.write().await.remove(token);
        if removed.is_some() {
            tracing::info!("Visitor session deleted");
        }
        removed
    }

    /// Number of tracked sessions (expired ones included until swept)
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Remove every expired session, returning their tokens
    pub async fn sweep_expired(&self) -> Vec<String> {
        let now = Utc::now();
        let mut sessions = self.inner.sessions.write().await;

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_expired(self.inner.timeout, now))
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            sessions.remove(token);
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Swept expired sessions");
        }

        expired
    }

    /// Move a session's last-seen time into the past
    #[cfg(test)]
    pub(crate) async fn backdate(&self, token: &str, by: Duration) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(session) = sessions.get_mut(token) {
            session.last_seen = session.last_seen - by;
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_without_token_creates_session() {
        let store = SessionStore::default();

        let resolved = store.resolve(None).await;

        assert!(resolved.created);
        assert!(!resolved.session.degraded_token);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_existing_token_refreshes() {
        let store = SessionStore::default();
        let first = store.resolve(None).await.session;
        store.backdate(&first.token, Duration::hours(1)).await;

        let second = store.resolve(Some(&first.token)).await;

        assert!(!second.created);
        assert_eq!(second.session.token, first.token);
        assert!(second.session.last_seen >= first.last_seen);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_token_creates_new() {
        let store = SessionStore::default();
        let bogus = "A".repeat(43);

        let resolved = store.resolve(Some(&bogus)).await;

        assert!(resolved.created);
        assert_ne!(resolved.session.token, bogus);
    }

    #[tokio::test]
    async fn test_resolve_expired_token_creates_new() {
        let store = SessionStore::new(Duration::hours(24));
        let old = store.resolve(None).await.session;
        store.backdate(&old.token, Duration::hours(24)).await;

        let resolved = store.resolve(Some(&old.token)).await;

        assert!(resolved.created);
        assert_ne!(resolved.session.token, old.token);
        assert!(store.lookup(&old.token).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_does_not_create() {
        let store = SessionStore::default();

        assert!(store.lookup("missing").await.is_none());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let store = SessionStore::new(Duration::hours(24));
        let stale = store.resolve(None).await.session;
        let fresh = store.resolve(None).await.session;
        store.backdate(&stale.token, Duration::hours(25)).await;

        let swept = store.sweep_expired().await;

        assert_eq!(swept, vec![stale.token.clone()]);
        assert!(store.lookup(&fresh.token).await.is_some());
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::default();
        let session = store.resolve(None).await.session;

        assert!(store.remove(&session.token).await.is_some());
        assert!(store.remove(&session.token).await.is_none());
        assert!(store.lookup(&session.token).await.is_none());
    }
}
