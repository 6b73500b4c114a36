//! HTTP client for LLM patch synthesis.
//!
//! Messages-API client with transient/permanent error classification and
//! exponential-backoff retries. Low temperature: patch synthesis wants the
//! most likely diff, not creativity.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::warn;

use crate::domain::models::config::LlmConfig;

use super::error::LlmApiError;
use super::types::{Message, MessageRequest, MessageResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PATCH_TEMPERATURE: f32 = 0.1;

/// Retry policy with exponential backoff for transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let backoff = self.initial_backoff.saturating_mul(2u32.saturating_pow(attempt));
        backoff.min(self.max_backoff)
    }
}

/// Messages-endpoint client used by the LLM patch strategy.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    retry_policy: RetryPolicy,
}

impl LlmClient {
    /// Build a client from config. Returns `None` when no API key is
    /// configured; absence only disables patch synthesis, not the run.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Some(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry_policy: RetryPolicy::default(),
        }))
    }

    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, LlmApiError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmApiError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LlmApiError::ServerError(status.as_u16()));
        }
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmApiError::ClientError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Request a completion for `prompt`, retrying transient failures.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: PATCH_TEMPERATURE,
            messages: vec![Message::user(prompt)],
        };

        let mut attempt = 0;
        loop {
            match self.send(&request).await {
                Ok(response) => {
                    let text = response.text();
                    if text.trim().is_empty() {
                        return Err(LlmApiError::EmptyResponse);
                    }
                    return Ok(text);
                }
                Err(err) if err.is_transient() && attempt < self.retry_policy.max_retries => {
                    let backoff = self.retry_policy.backoff_for(attempt);
                    warn!(%err, attempt, backoff_secs = backoff.as_secs(), "transient LLM error, backing off");
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Strip surrounding markdown code-fence markup from a model response.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. `diff`) on the opening fence line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diff_fences() {
        let fenced = "```diff\n--- a/x\n+++ b/x\n```";
        assert_eq!(strip_code_fences(fenced), "--- a/x\n+++ b/x");
    }

    #[test]
    fn strips_bare_fences() {
        let fenced = "```\npatch body\n```";
        assert_eq!(strip_code_fences(fenced), "patch body");
    }

    #[test]
    fn unfenced_text_passes_through() {
        assert_eq!(strip_code_fences("  --- a/x  "), "--- a/x");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(30));
    }

    #[test]
    fn client_is_disabled_without_api_key() {
        let client = LlmClient::from_config(&LlmConfig::default()).unwrap();
        assert!(client.is_none());
    }
}
