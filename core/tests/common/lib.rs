//! Fakes for the two external services plus shared fixtures.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use resumebot_core::ChunkUnit;
use resumebot_core::CompletionService;
use resumebot_core::EmbeddingError;
use resumebot_core::EmbeddingProvider;
use resumebot_core::RagConfig;
use resumebot_core::ServiceFailure;
use resumebot_core::embeddings::HashingEmbedder;

pub const PARAGRAPH_ONE: &str = "Maria Silva is a software engineer based in Lisbon. \
She has spent eight years building payment systems in Java and Kotlin.";

pub const PARAGRAPH_TWO: &str = "Maria earned her master's degree in distributed systems \
from the University of Coimbra in 2016.";

/// Two short paragraphs separated by a blank line.
pub fn two_paragraph_resume() -> String {
    format!("{PARAGRAPH_ONE}\n\n{PARAGRAPH_TWO}")
}

/// Small char-unit chunks, offline embeddings, no retry delay.
pub fn test_config() -> RagConfig {
    RagConfig {
        chunk_size: 50,
        chunk_overlap: 10,
        chunk_unit: ChunkUnit::Chars,
        top_k: 1,
        embedding_model: "hashing:256".to_string(),
        retry_base_delay_ms: 10,
        ..Default::default()
    }
}

/// Feature-hashing embedder that counts calls and can be switched to fail.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
    failing: Mutex<bool>,
}

impl CountingEmbedder {
    pub fn new(dimensions: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedder::new(dimensions),
            calls: AtomicUsize::new(0),
            failing: Mutex::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model_id(&self) -> String {
        format!("counting:{}", self.inner.dimensions())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(EmbeddingError::ApiError("embedding service unavailable".to_string()));
        }
        Ok(self.inner.embed_sync(text))
    }
}

/// Completion service that plays back a script, then a fallback outcome.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, ServiceFailure>>>,
    fallback: Result<String, ServiceFailure>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    /// Always answers `answer`.
    pub fn answering(answer: &str) -> Arc<Self> {
        Self::scripted(Vec::new(), Ok(answer.to_string()))
    }

    pub fn scripted(
        script: Vec<Result<String, ServiceFailure>>,
        fallback: Result<String, ServiceFailure>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            prompts: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    /// Like `answering`, but every call first sleeps for `delay`.
    pub fn slow(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceFailure> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

pub fn transient(message: &str) -> Result<String, ServiceFailure> {
    Err(ServiceFailure::Transient(message.to_string()))
}
