use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::EmbeddingProvider;
use super::EmbeddingVector;
use crate::cache::EmbeddingCache;
use crate::error::RagError;
use crate::error::Result;
use crate::text::ContentHash;

/// Embeds text through the provider, memoized by content hash.
///
/// Failures are not retried here; embedding sits on the critical path of
/// every query and a timeout is reported as `EmbeddingService`.
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    timeout: Duration,
}

impl EmbeddingEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    pub fn model_id(&self) -> String {
        self.provider.model_id()
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let key = ContentHash::of(text);
        if let Some(vector) = self.cache.get(&key) {
            debug!(key = %key, "embedding cache hit");
            return Ok(vector);
        }

        let values = tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| {
                RagError::EmbeddingService(format!(
                    "embedding request timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;
        if values.is_empty() {
            return Err(RagError::EmbeddingService(
                "provider returned an empty embedding".to_string(),
            ));
        }

        let vector: EmbeddingVector = Arc::from(values);
        self.cache.put(key, Arc::clone(&vector));
        Ok(vector)
    }

    /// Store a vector computed elsewhere, e.g. restored from a snapshot.
    pub fn seed(&self, text: &str, vector: EmbeddingVector) {
        self.cache.put(ContentHash::of(text), vector);
    }
}
