//! Gemini `generateContent` client used as the completion collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::CompletionError;
use crate::extraction::CompletionSource;
use crate::models::config::CompletionConfig;

/// Async HTTP client for the Gemini generative language API.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client for `model`.
    ///
    /// Fails when no API key is configured. Deadlines are applied by the
    /// caller, not by the HTTP client.
    pub fn new(config: &CompletionConfig, model: &str) -> Result<Self, CompletionError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| CompletionError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("invex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            api_key,
            temperature: config.temperature,
            client,
        })
    }

    /// Model this client requests.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for `models/{model}:generateContent`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, temperature: Option<f32>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: temperature.map(|temperature| GenerationConfig { temperature }),
        }
    }
}

/// Response body of `generateContent`.
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, CompletionError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(CompletionError::Service(format!("prompt blocked: {}", reason)));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CompletionError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionSource for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = GenerateRequest::new(prompt, self.temperature);
        debug!("Requesting completion from {} ({} chars)", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CompletionError::Http(format!("cannot connect to {}", self.base_url))
                } else {
                    CompletionError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        let text = parsed.into_text()?;
        trace!("Completion text: {}", text);
        Ok(text)
    }
}
