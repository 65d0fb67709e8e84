//! Process configuration: one immutable, validated structure handed to every
//! component constructor.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then the
//! process environment (after loading `.env`). Validation runs once at the end
//! and any failure is fatal to startup.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::RagError;
use crate::error::Result;

/// Dimensionality of the hashing embedder when none is given. Matches the
/// MiniLM sentence model the document index was originally built with.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

/// Unit in which `chunk_size` and `chunk_overlap` are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Whitespace-delimited words.
    #[default]
    Words,
    /// Unicode scalar values.
    Chars,
}

impl FromStr for ChunkUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "words" | "word" => Ok(Self::Words),
            "chars" | "char" | "characters" => Ok(Self::Chars),
            other => Err(format!("unknown chunk unit '{other}' (expected words or chars)")),
        }
    }
}

impl fmt::Display for ChunkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkUnit::Words => f.write_str("words"),
            ChunkUnit::Chars => f.write_str("chars"),
        }
    }
}

/// Which embedding backend `EMBEDDING_MODEL` selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingModel {
    /// Remote Gemini `embedContent` model.
    Gemini { model: String },
    /// Local deterministic feature-hashing embedder.
    Hashing { dimensions: usize },
}

impl EmbeddingModel {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RagError::configuration("EMBEDDING_MODEL", "must not be empty"));
        }
        let (provider, model) = match raw.split_once(':') {
            Some((provider, model)) => (provider, Some(model)),
            None => (raw, None),
        };
        match (provider, model) {
            ("hashing", None) => Ok(Self::Hashing {
                dimensions: DEFAULT_HASHING_DIMENSIONS,
            }),
            ("hashing", Some(dims)) => {
                let dimensions = dims.parse::<usize>().map_err(|_| {
                    RagError::configuration(
                        "EMBEDDING_MODEL",
                        format!("invalid hashing dimensions '{dims}'"),
                    )
                })?;
                if dimensions == 0 {
                    return Err(RagError::configuration(
                        "EMBEDDING_MODEL",
                        "hashing dimensions must be positive",
                    ));
                }
                Ok(Self::Hashing { dimensions })
            }
            ("gemini", Some(model)) if !model.trim().is_empty() => Ok(Self::Gemini {
                model: model.trim().to_string(),
            }),
            ("gemini", _) => Err(RagError::configuration(
                "EMBEDDING_MODEL",
                "gemini model name is missing",
            )),
            (_, None) => Ok(Self::Gemini {
                model: raw.to_string(),
            }),
            (other, Some(_)) => Err(RagError::configuration(
                "EMBEDDING_MODEL",
                format!("unknown embedding provider '{other}'"),
            )),
        }
    }
}

/// Validated runtime configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_unit: ChunkUnit,
    pub top_k: usize,
    pub embedding_model: String,
    pub embedding_cache_size: usize,
    pub embedding_timeout_secs: u64,
    pub response_cache_size: usize,
    pub cache_ttl_secs: u64,
    pub rate_limit: u32,
    pub rate_limit_period_secs: u64,
    /// Also gate inbound `ask` calls with a limiter of the same shape.
    pub rate_limit_ask: bool,
    pub gemini_timeout_secs: u64,
    /// Total attempts made against the completion service per request.
    pub gemini_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub gemini_model: String,
    pub gemini_api_url: String,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub resume_path: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            chunk_overlap: 50,
            chunk_unit: ChunkUnit::Words,
            top_k: 3,
            embedding_model: "gemini:text-embedding-004".to_string(),
            embedding_cache_size: 1000,
            embedding_timeout_secs: 10,
            response_cache_size: 100,
            cache_ttl_secs: 3600,
            rate_limit: 100,
            rate_limit_period_secs: 60,
            rate_limit_ask: false,
            gemini_timeout_secs: 10,
            gemini_max_retries: 3,
            retry_base_delay_ms: 500,
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_api_key: None,
            resume_path: PathBuf::from("resume.txt"),
        }
    }
}

impl fmt::Debug for RagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RagConfig")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("chunk_unit", &self.chunk_unit)
            .field("top_k", &self.top_k)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_cache_size", &self.embedding_cache_size)
            .field("embedding_timeout_secs", &self.embedding_timeout_secs)
            .field("response_cache_size", &self.response_cache_size)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_period_secs", &self.rate_limit_period_secs)
            .field("rate_limit_ask", &self.rate_limit_ask)
            .field("gemini_timeout_secs", &self.gemini_timeout_secs)
            .field("gemini_max_retries", &self.gemini_max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_url", &self.gemini_api_url)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("resume_path", &self.resume_path)
            .finish()
    }
}

impl RagConfig {
    /// Load defaults, the optional TOML file, `.env` and the environment, then
    /// validate.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config = match config_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    RagError::configuration(
                        "config file",
                        format!("cannot read {}: {e}", path.display()),
                    )
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(RagError::configuration(".env", err.to_string())),
        }

        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document whose keys are the lowercase field names.
    /// Missing keys keep their defaults. The result is not yet validated.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| RagError::configuration("config file", e.to_string()))
    }

    /// Override fields from environment-style variables.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CHUNK_SIZE") {
            self.chunk_size = parse_var("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            self.chunk_overlap = parse_var("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("CHUNK_UNIT") {
            self.chunk_unit = v
                .parse()
                .map_err(|message: String| RagError::configuration("CHUNK_UNIT", message))?;
        }
        if let Some(v) = get("TOP_K_RESULTS") {
            self.top_k = parse_var("TOP_K_RESULTS", &v)?;
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.embedding_model = v.trim().to_string();
        }
        if let Some(v) = get("EMBEDDING_CACHE_SIZE") {
            self.embedding_cache_size = parse_var("EMBEDDING_CACHE_SIZE", &v)?;
        }
        if let Some(v) = get("EMBEDDING_TIMEOUT") {
            self.embedding_timeout_secs = parse_var("EMBEDDING_TIMEOUT", &v)?;
        }
        if let Some(v) = get("RESPONSE_CACHE_SIZE") {
            self.response_cache_size = parse_var("RESPONSE_CACHE_SIZE", &v)?;
        }
        if let Some(v) = get("CACHE_TTL") {
            self.cache_ttl_secs = parse_var("CACHE_TTL", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT") {
            self.rate_limit = parse_var("RATE_LIMIT", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_PERIOD") {
            self.rate_limit_period_secs = parse_var("RATE_LIMIT_PERIOD", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_ASK") {
            self.rate_limit_ask = parse_bool("RATE_LIMIT_ASK", &v)?;
        }
        if let Some(v) = get("GEMINI_TIMEOUT") {
            self.gemini_timeout_secs = parse_var("GEMINI_TIMEOUT", &v)?;
        }
        if let Some(v) = get("GEMINI_MAX_RETRIES") {
            self.gemini_max_retries = parse_var("GEMINI_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("GEMINI_RETRY_BASE_MS") {
            self.retry_base_delay_ms = parse_var("GEMINI_RETRY_BASE_MS", &v)?;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini_model = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_API_URL") {
            self.gemini_api_url = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v.trim().to_string());
        }
        if let Some(v) = get("RESUME_PATH") {
            self.resume_path = PathBuf::from(v.trim());
        }
        Ok(self)
    }

    /// Reject any value the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure_positive("CHUNK_SIZE", self.chunk_size as u64)?;
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::configuration(
                "CHUNK_OVERLAP",
                format!(
                    "must be smaller than CHUNK_SIZE ({} >= {})",
                    self.chunk_overlap, self.chunk_size
                ),
            ));
        }
        ensure_positive("TOP_K_RESULTS", self.top_k as u64)?;
        ensure_positive("EMBEDDING_CACHE_SIZE", self.embedding_cache_size as u64)?;
        ensure_positive("EMBEDDING_TIMEOUT", self.embedding_timeout_secs)?;
        ensure_positive("RESPONSE_CACHE_SIZE", self.response_cache_size as u64)?;
        ensure_positive("CACHE_TTL", self.cache_ttl_secs)?;
        ensure_positive("RATE_LIMIT", u64::from(self.rate_limit))?;
        ensure_positive("RATE_LIMIT_PERIOD", self.rate_limit_period_secs)?;
        ensure_positive("GEMINI_TIMEOUT", self.gemini_timeout_secs)?;
        ensure_positive("GEMINI_MAX_RETRIES", u64::from(self.gemini_max_retries))?;
        ensure_positive("GEMINI_RETRY_BASE_MS", self.retry_base_delay_ms)?;
        if self.gemini_model.trim().is_empty() {
            return Err(RagError::configuration("GEMINI_MODEL", "must not be empty"));
        }
        if self.gemini_api_url.trim().is_empty() {
            return Err(RagError::configuration("GEMINI_API_URL", "must not be empty"));
        }
        EmbeddingModel::parse(&self.embedding_model)?;
        Ok(())
    }

    pub fn embedding(&self) -> Result<EmbeddingModel> {
        EmbeddingModel::parse(&self.embedding_model)
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub const fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_secs)
    }

    pub const fn gemini_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini_timeout_secs)
    }

    pub const fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Parameters that change which answer a question would get. Folded into
    /// response-cache keys and persisted index snapshots.
    pub fn retrieval_fingerprint(&self) -> String {
        format!(
            "top_k={};chunk={}/{}/{};embedding={}",
            self.top_k,
            self.chunk_size,
            self.chunk_overlap,
            self.chunk_unit,
            self.embedding_model.trim()
        )
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| RagError::configuration(key, format!("'{}' is not a valid number: {e}", raw.trim())))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RagError::configuration(
            key,
            format!("'{other}' is not a boolean"),
        )),
    }
}

fn ensure_positive(key: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(RagError::configuration(key, "must be positive"));
    }
    Ok(())
}
