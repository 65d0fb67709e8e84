//! Bounded, thread-safe caches in front of the two external services.
//!
//! ```text
//! EmbeddingCache   ContentHash -> EmbeddingVector   LRU, no expiry
//! ResponseCache    QuestionKey -> answer            LRU + TTL
//! ```
//!
//! Each cache keeps its recency list and its statistics behind a single
//! mutex, so a `get` or `put` is atomic with respect to every other call and
//! eviction order is never observed half-updated. A poisoned lock surfaces as
//! `CacheError`, which callers degrade to a miss.

pub mod embedding;
pub mod response;

pub use embedding::EmbeddingCache;
pub use response::QuestionKey;
pub use response::ResponseCache;

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Serialize;

use crate::error::CacheError;

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries dropped because their TTL had passed.
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f32 / total as f32
        } else {
            0.0
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> Result<MutexGuard<'a, T>, CacheError> {
    mutex.lock().map_err(|_| CacheError::Poisoned(name))
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
