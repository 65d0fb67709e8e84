//! Gemini `generateContent` completion service.

use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::CompletionService;
use super::ServiceFailure;
use crate::config::RagConfig;
use crate::error::RagError;
use crate::error::Result;

pub struct GeminiCompletion {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl GeminiCompletion {
    pub fn new(api_key: String, model: String, api_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::InferenceService(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RagError::configuration("GEMINI_API_KEY", "must be set"))?;
        Self::new(
            api_key,
            config.gemini_model.clone(),
            config.gemini_api_url.clone(),
            config.gemini_timeout(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// 408, 429 and every 5xx are worth retrying; any other non-success is not.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn answer_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
    (!text.trim().is_empty()).then_some(text)
}

#[async_trait::async_trait]
impl CompletionService for GeminiCompletion {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ServiceFailure> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceFailure::Transient(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let message = format!("Gemini API error ({status}): {detail}");
            debug!(%status, "completion request failed");
            return Err(if is_transient_status(status) {
                ServiceFailure::Transient(message)
            } else {
                ServiceFailure::Rejected(message)
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ServiceFailure::Transient(e.without_url().to_string())
            } else {
                ServiceFailure::Rejected(format!("unreadable response: {}", e.without_url()))
            }
        })?;
        answer_text(parsed)
            .ok_or_else(|| ServiceFailure::Rejected("response contained no candidate text".to_string()))
    }
}
