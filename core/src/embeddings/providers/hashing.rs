//! Local feature-hashing embedder.
//!
//! Each normalized token is hashed into one of `dimensions` buckets with a
//! sign taken from the same digest; the bag is then L2-normalized. Texts that
//! share vocabulary land close under cosine similarity, which is enough for
//! offline runs and deterministic tests.

use sha2::Digest;
use sha2::Sha256;

use super::super::EmbeddingError;
use super::super::EmbeddingProvider;
use crate::text::normalize;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Synchronous core of [`EmbeddingProvider::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }
        let normalized = normalize(text);
        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> String {
        format!("hashing:{}", self.dimensions)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::Empty);
        }
        Ok(self.embed_sync(text))
    }
}
