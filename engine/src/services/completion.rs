//! Completion-service client
//!
//! Speaks the OpenAI-style chat-completions wire shape. Transport-level
//! failures map to `Unreachable` so the generator can tell a dead
//! service apart from a bad reply.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::traits::CompletionClient;
use crate::types::{CompletionFailure, CompletionReply, CompletionRequest};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for the completion service
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Real completion client over HTTP
pub struct HttpCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::ConfigError {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionReply, CompletionFailure> {
        let request_body = serde_json::json!({
            "model": request.model,
            "messages": [
                {
                    "role": "user",
                    "content": request.prompt
                }
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| CompletionFailure::Unreachable(e.to_string()))?;

        let latency = started.elapsed();

        if !response.status().is_success() {
            return match response.status().as_u16() {
                401 | 403 => Err(CompletionFailure::AuthenticationFailed),
                429 => Err(CompletionFailure::RateLimited),
                code => Err(CompletionFailure::ServerError(format!("HTTP {code}"))),
            };
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionFailure::InvalidReply(format!("failed to parse response: {e}")))?;

        let content = response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| CompletionFailure::InvalidReply("no content in response".to_string()))?;

        let tokens_used = response_json
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(|tokens| tokens.as_u64())
            .unwrap_or(0) as u32;

        Ok(CompletionReply {
            content: content.to_string(),
            model: request.model.clone(),
            tokens_used,
            latency,
        })
    }
}
