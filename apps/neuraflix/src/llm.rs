//! # Title Extraction
//!
//! Free text in, ordered candidate titles out. The language model is only
//! asked for a numbered list; parsing lives in
//! [`neuraflix_core::titles`].

use crate::error::ExtractionError;
use async_trait::async_trait;
use neuraflix_core::titles::{EXTRACTION_INSTRUCTION, parse_titles};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// A chat-style language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One system + user exchange; returns the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError>;
}

// =============================================================================
// CHAT COMPLETIONS CLIENT
// =============================================================================

/// OpenAI-compatible `/chat/completions` client (Groq by default).
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        })
    }

    /// Assistant text of the first choice.
    fn extract_content(response: &Value) -> Result<String, ExtractionError> {
        response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ExtractionError::Reply("no choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ExtractionError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user))
            .send()
            .await
            .map_err(|e| ExtractionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Reply(e.to_string()))?;
        Self::extract_content(&value)
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Prompt → titles, bounded by a timeout.
#[derive(Clone)]
pub struct TitleExtractor {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TitleExtractor {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// An empty list is a valid answer.
    pub async fn extract(&self, prompt: &str) -> Result<Vec<String>, ExtractionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(Vec::new());
        }
        let reply = tokio::time::timeout(self.timeout, self.client.complete(EXTRACTION_INSTRUCTION, prompt))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout.as_secs()))??;

        let titles = parse_titles(&reply);
        tracing::info!(count = titles.len(), "titles extracted");
        Ok(titles)
    }
}

// =============================================================================
// TESTS
// =============================================================================
