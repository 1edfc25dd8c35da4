//! Translation Cache
//!
//! Two layers, both safe under concurrent access:
//! - Memory: bounded LRU behind a `tokio::sync::RwLock`
//! - Disk: one JSON file per key at `<cache_dir>/<shard>/<digest>.json`
//!
//! Disk entries are written to a temporary file and renamed into place, so a
//! reader sees either the old value or the new one, never a partial file.

mod key;

pub use key::{normalize_text, CacheKey};

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Fallback capacity when configured with zero
const DEFAULT_MEMORY_ENTRIES: usize = 10_000;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk entry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiskEntry {
    key: CacheKey,
    translation: String,
    written_at: DateTime<Utc>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// Shared translation cache
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    memory: RwLock<LruCache<String, String>>,
    dir: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl TranslationCache {
    pub fn new(dir: impl Into<PathBuf>, memory_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(memory_entries)
            .or_else(|| NonZeroUsize::new(DEFAULT_MEMORY_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(CacheInner {
                memory: RwLock::new(LruCache::new(capacity)),
                dir: dir.into(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.inner
            .dir
            .join(key.shard())
            .join(format!("{}.json", key.digest))
    }

    /// Look up a translation, promoting disk hits into memory
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        if let Some(value) = self.inner.memory.write().await.get(&key.digest).cloned() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        match self.read_disk(key).await {
            Ok(Some(value)) => {
                self.inner
                    .memory
                    .write()
                    .await
                    .put(key.digest.clone(), value.clone());
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                tracing::warn!(digest = %key.digest, error = %e, "Unreadable cache entry, treating as miss");
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a translation, overwriting any previous value
    pub async fn put(&self, key: &CacheKey, translation: &str) -> Result<(), CacheError> {
        self.write_disk(key, translation).await?;
        self.inner
            .memory
            .write()
            .await
            .put(key.digest.clone(), translation.to_string());
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            writes: self.inner.writes.load(Ordering::Relaxed),
        }
    }

    /// Entries currently held in memory
    pub async fn memory_len(&self) -> usize {
        self.inner.memory.read().await.len()
    }

    #[cfg(test)]
    async fn clear_memory(&self) {
        self.inner.memory.write().await.clear();
    }

    async fn read_disk(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let path = self.entry_path(key);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let entry: DiskEntry = serde_json::from_slice(&data)?;
        if entry.key.digest != key.digest {
            return Ok(None);
        }
        Ok(Some(entry.translation))
    }

    async fn write_disk(&self, key: &CacheKey, translation: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let shard_dir = self.inner.dir.join(key.shard());
        tokio::fs::create_dir_all(&shard_dir)
            .await
            .map_err(|source| CacheError::Io {
                path: shard_dir.clone(),
                source,
            })?;

        let entry = DiskEntry {
            key: key.clone(),
            translation: translation.to_string(),
            written_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&entry)?;

        let tmp = shard_dir.join(format!(".{}.{}.tmp", key.digest, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Io { path, source });
        }

        tracing::trace!(digest = %key.digest, "Cache entry written");
        Ok(())
    }
}
