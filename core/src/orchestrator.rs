//! The end-to-end ask flow.
//!
//! ```text
//! Received -> CacheCheck -> CacheHit -> Done
//!                        \-> CacheMiss -> Embedding -> Retrieval
//!                            -> PromptAssembly -> Inference -> CacheWrite -> Done
//! ```
//!
//! `Failed` is reachable from Embedding, Retrieval and Inference (and from
//! Received when inbound rate limiting is enabled). All shared state lives in
//! long-lived service objects handed in at construction; the vector index is
//! written once by ingestion and read without locking afterwards.

use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

use serde::Deserialize;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::Instrument;
use tracing::debug;
use tracing::info;
use tracing::info_span;

use crate::cache::CacheStats;
use crate::cache::EmbeddingCache;
use crate::cache::QuestionKey;
use crate::cache::ResponseCache;
use crate::chunker::Chunk;
use crate::chunker::ChunkId;
use crate::chunker::Chunker;
use crate::config::RagConfig;
use crate::embeddings::EmbeddingEngine;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::create_provider;
use crate::error::RagError;
use crate::error::Result;
use crate::inference::CompletionService;
use crate::inference::GeminiCompletion;
use crate::inference::InferenceClient;
use crate::inference::RetryPolicy;
use crate::prompt::build_prompt;
use crate::rate_limiter::RateLimiter;
use crate::vector_index::IndexEntry;
use crate::vector_index::VectorIndex;

/// States of a single `ask` call, logged at debug level as they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskStage {
    Received,
    CacheCheck,
    CacheHit,
    CacheMiss,
    Embedding,
    Retrieval,
    PromptAssembly,
    Inference,
    CacheWrite,
    Done,
    Failed,
}

impl AskStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AskStage::Received => "received",
            AskStage::CacheCheck => "cache_check",
            AskStage::CacheHit => "cache_hit",
            AskStage::CacheMiss => "cache_miss",
            AskStage::Embedding => "embedding",
            AskStage::Retrieval => "retrieval",
            AskStage::PromptAssembly => "prompt_assembly",
            AskStage::Inference => "inference",
            AskStage::CacheWrite => "cache_write",
            AskStage::Done => "done",
            AskStage::Failed => "failed",
        }
    }
}

impl fmt::Display for AskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk selected as context for an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: ChunkId,
    pub ordinal: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub from_cache: bool,
    /// Context the answer was generated from, best first. Empty on a cache hit.
    pub sources: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    /// Ingestion has completed and `ask` can be served.
    pub ready: bool,
    pub indexed_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub dimensions: usize,
    /// Loaded from pre-computed embeddings instead of the embedding service.
    pub restored: bool,
}

/// A chunk with its embedding, computed by an earlier ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedChunk {
    pub id: ChunkId,
    pub ordinal: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStats {
    pub embedding_cache: CacheStats,
    pub response_cache: CacheStats,
    pub indexed_chunks: usize,
}

pub struct RetrievalOrchestrator {
    config: RagConfig,
    fingerprint: String,
    chunker: Chunker,
    embeddings: EmbeddingEngine,
    index: OnceLock<VectorIndex>,
    ingest_lock: tokio::sync::Mutex<()>,
    responses: Arc<ResponseCache>,
    inference: InferenceClient,
    ask_limiter: Option<RateLimiter>,
}

impl RetrievalOrchestrator {
    /// Build every service object from `config` around the two external
    /// services.
    pub fn new(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        completion_service: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        config.validate()?;
        let embeddings = EmbeddingEngine::new(
            embedding_provider,
            Arc::new(EmbeddingCache::new(config.embedding_cache_size)),
            config.embedding_timeout(),
        );
        let responses = Arc::new(ResponseCache::new(
            config.response_cache_size,
            config.cache_ttl(),
        ));
        let inference = InferenceClient::new(
            completion_service,
            Arc::new(RateLimiter::new(config.rate_limit, config.rate_limit_period())),
            RetryPolicy::from_config(&config),
        );
        Self::from_parts(config, embeddings, responses, inference)
    }

    /// Gemini for completions, `EMBEDDING_MODEL` for embeddings.
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let provider = create_provider(&config)?;
        let completion = Arc::new(GeminiCompletion::from_config(&config)?);
        Self::new(config, provider, completion)
    }

    /// Assemble from service objects the caller already owns, e.g. caches
    /// shared with another component or an inference client with a custom
    /// retry policy.
    pub fn from_parts(
        config: RagConfig,
        embeddings: EmbeddingEngine,
        responses: Arc<ResponseCache>,
        inference: InferenceClient,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::from_config(&config)?;
        let ask_limiter = config
            .rate_limit_ask
            .then(|| RateLimiter::new(config.rate_limit, config.rate_limit_period()));
        Ok(Self {
            fingerprint: config.retrieval_fingerprint(),
            config,
            chunker,
            embeddings,
            index: OnceLock::new(),
            ingest_lock: tokio::sync::Mutex::new(()),
            responses,
            inference,
            ask_limiter,
        })
    }

    pub const fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn question_key(&self, question: &str) -> QuestionKey {
        QuestionKey::new(&self.fingerprint, question)
    }

    pub fn response_cache(&self) -> &Arc<ResponseCache> {
        &self.responses
    }

    /// Chunk, embed and index the document. Runs once; a second call fails
    /// with `AlreadyIngested`.
    pub async fn ingest(&self, document_text: &str) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        if self.index.get().is_some() {
            return Err(RagError::AlreadyIngested);
        }

        let chunks = self.chunker.chunk(document_text);
        info!(chunk_count = chunks.len(), "ingesting document");
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self.embeddings.embed(&chunk.text).await?;
            entries.push(IndexEntry { chunk, vector });
        }
        self.install(entries, false)
    }

    /// Index chunks embedded earlier and seed the embedding cache with them.
    pub async fn ingest_prepared(&self, prepared: Vec<PreparedChunk>) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        if self.index.get().is_some() {
            return Err(RagError::AlreadyIngested);
        }

        let entries: Vec<IndexEntry> = prepared
            .into_iter()
            .map(|p| {
                let vector: Arc<[f32]> = Arc::from(p.vector);
                self.embeddings.seed(&p.text, Arc::clone(&vector));
                IndexEntry {
                    chunk: Chunk {
                        id: p.id,
                        text: p.text,
                        ordinal: p.ordinal,
                    },
                    vector,
                }
            })
            .collect();
        info!(chunk_count = entries.len(), "restoring prepared chunks");
        self.install(entries, true)
    }

    fn install(&self, entries: Vec<IndexEntry>, restored: bool) -> Result<IngestReport> {
        let index = VectorIndex::build(entries)?;
        let report = IngestReport {
            chunks: index.len(),
            dimensions: index.dimensions(),
            restored,
        };
        self.index
            .set(index)
            .map_err(|_| RagError::AlreadyIngested)?;
        info!(
            chunks = report.chunks,
            dimensions = report.dimensions,
            restored,
            "vector index ready"
        );
        Ok(report)
    }

    /// Answer `question` from the document. Suspends at the embedding and
    /// completion calls.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let key = self.question_key(question);
        let span = info_span!("ask", question_key = %key);
        async move {
            let mut stage = AskStage::Received;
            let result = self.run_stages(question, key, &mut stage).await;
            if let Err(err) = &result {
                debug!(
                    stage = %AskStage::Failed,
                    failed_in = %stage,
                    error_code = %err.error_code(),
                    error = %err,
                    "ask failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run `ask` as an independent task on the current runtime.
    pub fn spawn_ask(self: &Arc<Self>, question: impl Into<String>) -> JoinHandle<Result<Answer>> {
        let this = Arc::clone(self);
        let question = question.into();
        tokio::spawn(async move { this.ask(&question).await })
    }

    async fn run_stages(
        &self,
        question: &str,
        key: QuestionKey,
        stage: &mut AskStage,
    ) -> Result<Answer> {
        enter(stage, AskStage::Received);
        if let Some(limiter) = &self.ask_limiter {
            limiter.try_acquire().into_result()?;
        }

        enter(stage, AskStage::CacheCheck);
        if let Some(text) = self.responses.get(&key) {
            enter(stage, AskStage::CacheHit);
            enter(stage, AskStage::Done);
            return Ok(Answer {
                text: text.to_string(),
                from_cache: true,
                sources: Vec::new(),
            });
        }
        enter(stage, AskStage::CacheMiss);

        let index = self.index.get().ok_or(RagError::EmptyIndex)?;

        enter(stage, AskStage::Embedding);
        let query = self.embeddings.embed(question).await.map_err(as_retrieval_failure)?;

        enter(stage, AskStage::Retrieval);
        let scored = index
            .search(&query, self.config.top_k)
            .map_err(as_retrieval_failure)?;
        let sources: Vec<RetrievedChunk> = scored
            .into_iter()
            .filter_map(|hit| {
                index.chunk(hit.id).map(|chunk| RetrievedChunk {
                    id: chunk.id,
                    ordinal: chunk.ordinal,
                    text: chunk.text.clone(),
                    score: hit.score,
                })
            })
            .collect();
        if sources.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        debug!(
            retrieved = sources.len(),
            top_score = sources[0].score,
            "retrieved context"
        );

        enter(stage, AskStage::PromptAssembly);
        let prompt = build_prompt(question, &sources);

        enter(stage, AskStage::Inference);
        let text = self.inference.complete(&prompt).await?;

        enter(stage, AskStage::CacheWrite);
        self.responses.put(key, text.as_str());

        enter(stage, AskStage::Done);
        Ok(Answer {
            text,
            from_cache: false,
            sources,
        })
    }

    pub fn health(&self) -> Health {
        let indexed_chunks = self.index.get().map_or(0, VectorIndex::len);
        Health {
            ready: indexed_chunks > 0,
            indexed_chunks,
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            embedding_cache: self.embeddings.cache().stats(),
            response_cache: self.responses.stats(),
            indexed_chunks: self.index.get().map_or(0, VectorIndex::len),
        }
    }

    /// Everything needed to rebuild the index without the embedding service.
    pub fn snapshot_entries(&self) -> Result<Vec<PreparedChunk>> {
        let index = self.index.get().ok_or(RagError::EmptyIndex)?;
        Ok(index
            .entries()
            .map(|entry| PreparedChunk {
                id: entry.chunk.id,
                ordinal: entry.chunk.ordinal,
                text: entry.chunk.text.clone(),
                vector: entry.vector.to_vec(),
            })
            .collect())
    }
}

fn enter(stage: &mut AskStage, next: AskStage) {
    *stage = next;
    debug!(stage = %next, "ask stage");
}

/// A question that cannot be embedded or searched means nothing was
/// retrieved.
fn as_retrieval_failure(err: RagError) -> RagError {
    match err {
        RagError::EmbeddingService(message) => RagError::RetrievalFailed(message),
        other => other,
    }
}
