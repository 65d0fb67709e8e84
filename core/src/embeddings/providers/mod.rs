//! Embedding provider implementations

pub mod gemini;
pub mod hashing;

pub use gemini::GeminiEmbedder;
pub use hashing::HashingEmbedder;

use std::sync::Arc;

use super::EmbeddingProvider;
use crate::config::EmbeddingModel;
use crate::config::RagConfig;
use crate::error::RagError;
use crate::error::Result;

/// Build the provider selected by `EMBEDDING_MODEL`.
pub fn create_provider(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding()? {
        EmbeddingModel::Hashing { dimensions } => Ok(Arc::new(HashingEmbedder::new(dimensions))),
        EmbeddingModel::Gemini { model } => {
            let api_key = config
                .gemini_api_key
                .clone()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    RagError::configuration("GEMINI_API_KEY", "required for gemini embeddings")
                })?;
            let embedder = GeminiEmbedder::new(
                api_key,
                model,
                config.gemini_api_url.clone(),
                config.embedding_timeout(),
            )?;
            Ok(Arc::new(embedder))
        }
    }
}
