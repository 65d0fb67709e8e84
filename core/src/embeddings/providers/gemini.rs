//! Gemini `embedContent` provider.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;

use super::super::EmbeddingError;
use super::super::EmbeddingProvider;
use crate::error::RagError;
use crate::error::Result;

/// Gemini embedding provider
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl GeminiEmbedder {
    /// `api_url` is the versioned base, e.g.
    /// `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(api_key: String, model: String, api_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::EmbeddingService(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.api_url, self.model)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    content: GeminiContent<'a>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    embedding: GeminiEmbedding,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_id(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let request = GeminiRequest {
            content: GeminiContent {
                parts: [GeminiPart { text }],
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            // The URL carries the API key.
            .map_err(|e| EmbeddingError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(error) = serde_json::from_str::<GeminiError>(&error_text) {
                return Err(EmbeddingError::ApiError(format!(
                    "Gemini API error ({}): {} - {}",
                    status,
                    error.error.status.unwrap_or_else(|| "Unknown".to_string()),
                    error.error.message
                )));
            }

            return Err(EmbeddingError::ApiError(format!(
                "Gemini API error ({status}): {error_text}"
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Failed to parse response: {}", e.without_url())))?;

        if gemini_response.embedding.values.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        Ok(gemini_response.embedding.values)
    }
}
