use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Stable, machine-readable codes for every failure the core can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Configuration (F000-F999)
    ConfigurationInvalid,
    AlreadyIngested,

    // Retrieval (C000-C999)
    EmbeddingServiceFailed,
    RetrievalFailed,
    IndexEmpty,
    CacheUnavailable,

    // Network / upstream (N000-N999)
    RateLimited,
    InferenceRejected,
    InferenceRetriesExhausted,

    // Generic (G000-G999)
    RuntimeUnavailable,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationInvalid => "F001",
            ErrorCode::AlreadyIngested => "F002",
            ErrorCode::EmbeddingServiceFailed => "C001",
            ErrorCode::RetrievalFailed => "C002",
            ErrorCode::IndexEmpty => "C003",
            ErrorCode::CacheUnavailable => "C004",
            ErrorCode::RateLimited => "N001",
            ErrorCode::InferenceRejected => "N002",
            ErrorCode::InferenceRetriesExhausted => "N003",
            ErrorCode::RuntimeUnavailable => "G001",
        }
    }

    pub const fn category(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationInvalid | ErrorCode::AlreadyIngested => "Configuration",
            ErrorCode::EmbeddingServiceFailed
            | ErrorCode::RetrievalFailed
            | ErrorCode::IndexEmpty
            | ErrorCode::CacheUnavailable => "Retrieval",
            ErrorCode::RateLimited
            | ErrorCode::InferenceRejected
            | ErrorCode::InferenceRetriesExhausted => "Network",
            ErrorCode::RuntimeUnavailable => "Generic",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.as_str(), self.category())
    }
}

/// What a client should conclude from a failed `ask`.
///
/// The HTTP layer maps these onto response statuses; the core only promises
/// that the classes stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// Temporary pressure or outage; the same request may succeed later.
    TryLater,
    /// Ingestion has not completed.
    NotReady,
    /// An upstream dependency failed or returned something unusable.
    Upstream,
    /// The completion service refused this particular request.
    Rejected,
    /// The process is misconfigured and should not be serving.
    Misconfigured,
}

impl ErrorStatus {
    pub const fn http_status(self) -> u16 {
        match self {
            ErrorStatus::TryLater => 429,
            ErrorStatus::NotReady => 503,
            ErrorStatus::Upstream => 502,
            ErrorStatus::Rejected => 502,
            ErrorStatus::Misconfigured => 500,
        }
    }
}

/// Failures inside the bounded caches. Never surfaced from `ask`: callers
/// treat them as a miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("{0} cache lock poisoned")]
    Poisoned(&'static str),
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("invalid configuration for {key}: {message}")]
    Configuration { key: String, message: String },

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The question could not be embedded, so nothing could be retrieved.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("vector index is empty; ingestion has not completed")]
    EmptyIndex,

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    /// Non-transient rejection from the completion service (bad request, auth).
    #[error("inference service rejected the request: {0}")]
    InferenceService(String),

    #[error("inference service unavailable after {attempts} attempts: {last_error}")]
    InferenceRetriesExhausted { attempts: u32, last_error: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("document has already been ingested")]
    AlreadyIngested,

    #[error("could not start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl RagError {
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    pub const fn error_code(&self) -> ErrorCode {
        match self {
            RagError::Configuration { .. } => ErrorCode::ConfigurationInvalid,
            RagError::EmbeddingService(_) => ErrorCode::EmbeddingServiceFailed,
            RagError::RetrievalFailed(_) => ErrorCode::RetrievalFailed,
            RagError::EmptyIndex => ErrorCode::IndexEmpty,
            RagError::RateLimitExceeded { .. } => ErrorCode::RateLimited,
            RagError::InferenceService(_) => ErrorCode::InferenceRejected,
            RagError::InferenceRetriesExhausted { .. } => ErrorCode::InferenceRetriesExhausted,
            RagError::Cache(_) => ErrorCode::CacheUnavailable,
            RagError::AlreadyIngested => ErrorCode::AlreadyIngested,
            RagError::Runtime(_) => ErrorCode::RuntimeUnavailable,
        }
    }

    pub const fn status(&self) -> ErrorStatus {
        match self {
            RagError::RateLimitExceeded { .. } | RagError::InferenceRetriesExhausted { .. } => {
                ErrorStatus::TryLater
            }
            RagError::EmptyIndex => ErrorStatus::NotReady,
            RagError::EmbeddingService(_) | RagError::RetrievalFailed(_) | RagError::Cache(_) => {
                ErrorStatus::Upstream
            }
            RagError::InferenceService(_) => ErrorStatus::Rejected,
            RagError::Configuration { .. } | RagError::AlreadyIngested | RagError::Runtime(_) => {
                ErrorStatus::Misconfigured
            }
        }
    }

    /// Whether the caller may retry the whole request after backing off.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::RateLimitExceeded { .. } | RagError::InferenceRetriesExhausted { .. }
        )
    }
}
