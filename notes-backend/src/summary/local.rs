use async_trait::async_trait;
use std::time::Duration;

use super::{SummaryError, SummaryProvider};

/// Number of leading words kept by the fallback summary
const SUMMARY_WORDS: usize = 5;
const SUMMARY_SUFFIX: &str = "...";

/// Deterministic stand-in for a real model: the first few words of the
/// content plus an ellipsis, after a simulated round-trip delay.
#[derive(Debug, Clone)]
pub struct LocalFallbackSummarizer {
    latency: Duration,
}

impl LocalFallbackSummarizer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

/// First five whitespace-delimited words joined by single spaces, then "...".
pub fn leading_words_summary(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().take(SUMMARY_WORDS).collect();
    format!("{}{}", words.join(" "), SUMMARY_SUFFIX)
}

#[async_trait]
impl SummaryProvider for LocalFallbackSummarizer {
    fn name(&self) -> &'static str {
        "local-fallback"
    }

    async fn generate(&self, content: &str) -> Result<String, SummaryError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(leading_words_summary(content))
    }
}
