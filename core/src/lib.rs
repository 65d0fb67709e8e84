//! Retrieval-augmented question answering over a single resume document.
//!
//! Ingestion chunks the document, embeds every chunk and bulk-loads a vector
//! index. Each question is answered from the response cache when possible;
//! otherwise it is embedded, matched against the index, assembled into a
//! prompt with the best chunks and sent to a rate-limited, retrying
//! completion client.

pub mod blocking;
pub mod cache;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod inference;
pub mod orchestrator;
pub mod prompt;
pub mod rate_limiter;
pub mod text;
pub mod vector_index;

pub use blocking::BlockingOrchestrator;
pub use cache::CacheStats;
pub use cache::EmbeddingCache;
pub use cache::QuestionKey;
pub use cache::ResponseCache;
pub use chunker::Chunk;
pub use chunker::ChunkId;
pub use chunker::Chunker;
pub use config::ChunkUnit;
pub use config::EmbeddingModel;
pub use config::RagConfig;
pub use embeddings::EmbeddingEngine;
pub use embeddings::EmbeddingError;
pub use embeddings::EmbeddingProvider;
pub use embeddings::EmbeddingVector;
pub use error::ErrorCode;
pub use error::ErrorStatus;
pub use error::RagError;
pub use error::Result;
pub use inference::CompletionService;
pub use inference::InferenceClient;
pub use inference::RetryPolicy;
pub use inference::ServiceFailure;
pub use orchestrator::Answer;
pub use orchestrator::AskStage;
pub use orchestrator::Health;
pub use orchestrator::IngestReport;
pub use orchestrator::PreparedChunk;
pub use orchestrator::RetrievalOrchestrator;
pub use orchestrator::RetrievedChunk;
pub use rate_limiter::Permit;
pub use rate_limiter::RateLimiter;
pub use vector_index::ScoredChunk;
pub use vector_index::VectorIndex;
