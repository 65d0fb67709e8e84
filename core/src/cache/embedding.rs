use std::sync::Mutex;

use lru::LruCache;
use tracing::warn;

use super::CacheStats;
use super::lock;
use super::non_zero;
use crate::embeddings::EmbeddingVector;
use crate::error::CacheError;
use crate::text::ContentHash;

const NAME: &str = "embedding";

struct Inner {
    entries: LruCache<ContentHash, EmbeddingVector>,
    stats: CacheStats,
}

/// Memoizes embedding vectors by content hash.
///
/// A vector stored under a hash is never replaced: a second `put` for the
/// same key only refreshes its recency.
pub struct EmbeddingCache {
    inner: Mutex<Inner>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = non_zero(capacity);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..Default::default()
                },
            }),
        }
    }

    pub fn try_get(&self, key: &ContentHash) -> Result<Option<EmbeddingVector>, CacheError> {
        let mut inner = lock(&self.inner, NAME)?;
        let found = inner.entries.get(key).cloned();
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        Ok(found)
    }

    pub fn try_put(&self, key: ContentHash, vector: EmbeddingVector) -> Result<(), CacheError> {
        let mut inner = lock(&self.inner, NAME)?;
        if inner.entries.get(&key).is_some() {
            return Ok(());
        }
        if let Some((evicted, _)) = inner.entries.push(key, vector) {
            tracing::trace!(key = %evicted, "evicted embedding");
            inner.stats.evictions += 1;
        }
        inner.stats.size = inner.entries.len();
        Ok(())
    }

    /// Lookup that degrades a cache failure to a miss.
    pub fn get(&self, key: &ContentHash) -> Option<EmbeddingVector> {
        self.try_get(key).unwrap_or_else(|err| {
            warn!(error = %err, "embedding cache read failed; treating as miss");
            None
        })
    }

    /// Insert that logs and drops the entry on cache failure.
    pub fn put(&self, key: ContentHash, vector: EmbeddingVector) {
        if let Err(err) = self.try_put(key, vector) {
            warn!(error = %err, "embedding cache write skipped");
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner, NAME).map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.inner, NAME)
            .map(|inner| inner.stats.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("stats", &self.stats())
            .finish()
    }
}
