//! Completion service boundary and the retrying, rate-limited client on top.

pub mod client;
pub mod gemini;

pub use client::InferenceClient;
pub use client::RetryPolicy;
pub use gemini::GeminiCompletion;

use async_trait::async_trait;
use thiserror::Error;

/// How a single completion attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceFailure {
    /// Timeout, connection failure, throttling or a 5xx; worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
    /// The service refused this request (bad request, auth, unusable body).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ServiceFailure {
    pub const fn is_transient(&self) -> bool {
        matches!(self, ServiceFailure::Transient(_))
    }
}

/// A large-language-model completion endpoint.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate the answer text for a fully assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceFailure>;
}
