//! Text to vector: provider trait, concrete providers, and the caching engine.

pub mod engine;
pub mod providers;

pub use engine::EmbeddingEngine;
pub use providers::GeminiEmbedder;
pub use providers::HashingEmbedder;
pub use providers::create_provider;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Immutable embedding, shared between the cache and the vector index.
pub type EmbeddingVector = Arc<[f32]>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider returned an empty embedding")]
    Empty,
}

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the unique model identifier, e.g. `gemini:text-embedding-004`.
    fn model_id(&self) -> String;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

