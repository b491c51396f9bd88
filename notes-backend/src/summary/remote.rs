//! Chat-completion backed summarizer (`{base_url}/chat/completions`).
//!
//! Wire types stay private to this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SummaryError, SummaryProvider};
use crate::config::Config;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes text.";
const MAX_TOKENS: u32 = 50;
const TEMPERATURE: f32 = 0.5;

pub struct RemoteModelSummarizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

// ── Chat completion wire types ──────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Provider impl ───────────────────────────────────

impl RemoteModelSummarizer {
    pub fn new(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.openai_base_url,
            &config.openai_model,
            &config.openai_api_key,
            config.summary_timeout,
        )
    }

    fn user_prompt(content: &str) -> String {
        format!("Summarize the following text:\n{}", content)
    }
}

/// Pull the trimmed text of the first choice out of a completion body.
fn extract_summary(body: &str) -> Result<String, SummaryError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| SummaryError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| SummaryError::MalformedResponse("no choices in response".to_string()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(SummaryError::MalformedResponse("empty completion".to_string()));
    }
    Ok(text.to_string())
}

#[async_trait]
impl SummaryProvider for RemoteModelSummarizer {
    fn name(&self) -> &'static str {
        "remote-model"
    }

    async fn generate(&self, content: &str) -> Result<String, SummaryError> {
        if self.api_key.is_empty() {
            return Err(SummaryError::MissingApiKey);
        }

        let prompt = Self::user_prompt(content);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        log::debug!(
            "[SUMMARY] Requesting summary from {} (content_len={})",
            self.model,
            content.len()
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SummaryError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| SummaryError::Request(format!("reading body: {}", e)))?;

        if !status.is_success() {
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_summary(&text)
    }
}
