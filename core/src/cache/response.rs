use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tracing::warn;

use super::CacheStats;
use super::lock;
use super::non_zero;
use crate::error::CacheError;
use crate::text::ContentHash;
use crate::text::normalize;

const NAME: &str = "response";

/// Response-cache key: hash of the retrieval fingerprint and the normalized
/// question. Questions differing only in case or whitespace share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionKey(ContentHash);

impl QuestionKey {
    pub fn new(fingerprint: &str, question: &str) -> Self {
        let material = format!("{fingerprint}\u{0}{}", normalize(question));
        Self(ContentHash::of_normalized(&material))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct Entry {
    answer: Arc<str>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

struct Inner {
    entries: LruCache<QuestionKey, Entry>,
    stats: CacheStats,
}

/// Final answers, bounded by count and by age.
///
/// An entry is served while `now <= inserted_at + ttl`. Expired entries are
/// removed when looked up or on `purge_expired`, and never returned.
pub struct ResponseCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = non_zero(capacity);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..Default::default()
                },
            }),
            ttl,
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn try_get(&self, key: &QuestionKey) -> Result<Option<Arc<str>>, CacheError> {
        let mut guard = lock(&self.inner, NAME)?;
        let inner = &mut *guard;
        let now = Instant::now();
        let lookup = inner
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| Arc::clone(&entry.answer)));
        match lookup {
            None => {
                inner.stats.misses += 1;
                Ok(None)
            }
            Some(Some(answer)) => {
                inner.stats.hits += 1;
                Ok(Some(answer))
            }
            Some(None) => {
                inner.entries.pop(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                inner.stats.size = inner.entries.len();
                Ok(None)
            }
        }
    }

    /// Insert or refresh the answer for `key`; its TTL restarts now.
    pub fn try_put(&self, key: QuestionKey, answer: Arc<str>) -> Result<(), CacheError> {
        let mut inner = lock(&self.inner, NAME)?;
        let entry = Entry {
            answer,
            expires_at: Instant::now().checked_add(self.ttl),
        };
        let replacing = inner.entries.contains(&key);
        let displaced = inner.entries.push(key, entry);
        if displaced.is_some() && !replacing {
            inner.stats.evictions += 1;
        }
        inner.stats.size = inner.entries.len();
        Ok(())
    }

    /// Lookup that degrades a cache failure to a miss.
    pub fn get(&self, key: &QuestionKey) -> Option<Arc<str>> {
        self.try_get(key).unwrap_or_else(|err| {
            warn!(error = %err, "response cache read failed; treating as miss");
            None
        })
    }

    pub fn put(&self, key: QuestionKey, answer: impl Into<Arc<str>>) {
        if let Err(err) = self.try_put(key, answer.into()) {
            warn!(error = %err, "response cache write skipped");
        }
    }

    /// Whether a live entry exists. Does not touch recency or statistics.
    pub fn contains(&self, key: &QuestionKey) -> bool {
        let now = Instant::now();
        lock(&self.inner, NAME)
            .map(|inner| {
                inner
                    .entries
                    .peek(key)
                    .is_some_and(|entry| !entry.is_expired(now))
            })
            .unwrap_or(false)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut inner) = lock(&self.inner, NAME) else {
            return 0;
        };
        let now = Instant::now();
        let expired: Vec<QuestionKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }
        inner.stats.expirations += expired.len() as u64;
        inner.stats.size = inner.entries.len();
        expired.len()
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

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}
