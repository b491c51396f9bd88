//! Summary generation for new notes.
//!
//! Providers implement [`SummaryProvider::generate`], which may fail. Callers
//! go through [`SummaryProvider::summarize`], which never does: any error is
//! logged and replaced with [`SUMMARY_UNAVAILABLE`].

pub mod local;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;

pub use local::LocalFallbackSummarizer;
pub use remote::RemoteModelSummarizer;

/// Summary text used whenever a provider cannot produce one.
pub const SUMMARY_UNAVAILABLE: &str = "Could not generate summary";

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Produce a summary, or the reason none could be produced.
    async fn generate(&self, content: &str) -> Result<String, SummaryError>;

    /// Always yields a non-empty summary.
    async fn summarize(&self, content: &str) -> String {
        match self.generate(content).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => {
                log::warn!("[SUMMARY] {} returned an empty summary", self.name());
                SUMMARY_UNAVAILABLE.to_string()
            }
            Err(e) => {
                log::error!("[SUMMARY] Error generating summary with {}: {}", self.name(), e);
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Pick the provider once at startup.
pub fn build_summarizer(config: &Config) -> Arc<dyn SummaryProvider> {
    if config.use_mock_llm {
        log::info!(
            "[SUMMARY] Using local fallback summarizer ({}ms simulated latency)",
            config.mock_llm_latency.as_millis()
        );
        Arc::new(LocalFallbackSummarizer::new(config.mock_llm_latency))
    } else {
        log::info!(
            "[SUMMARY] Using remote model {} at {}",
            config.openai_model,
            config.openai_base_url
        );
        if config.openai_api_key.is_empty() {
            log::warn!("[SUMMARY] OPENAI_API_KEY is empty; every summary will fall back");
        }
        Arc::new(RemoteModelSummarizer::from_config(config))
    }
}
