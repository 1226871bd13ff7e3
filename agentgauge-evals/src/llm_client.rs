// Copyright 2025 Agentgauge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Model client abstraction used by judges, agents, and actors.
//!
//! Every model invocation in the engine goes through the [`ModelClient`]
//! trait: scoring a transcript, producing an agent reply, or playing the
//! simulated user. Implementations are injected as `Arc<dyn ModelClient>`
//! so tests can substitute deterministic mocks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use agentgauge_core::{Role, ToolCall, Turn};

/// Errors surfaced by model client implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("api error: {0}")]
    ApiError(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::ApiError(_)
                | ClientError::RateLimitExceeded
                | ClientError::Timeout(_)
                | ClientError::Http(_)
        )
    }
}

/// Token counts reported by the provider, when available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Cost in dollars given per-1k-token rates.
    pub fn calculate_cost(&self, input_cost_per_1k: f64, output_cost_per_1k: f64) -> f64 {
        (self.input_tokens as f64 / 1000.0) * input_cost_per_1k
            + (self.output_tokens as f64 / 1000.0) * output_cost_per_1k
    }
}

/// One completion from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Concatenated text content.
    pub content: String,

    /// Tool invocations the model requested, if any.
    pub tool_calls: Vec<ToolCall>,

    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,

    /// Model that produced the response.
    pub model: String,

    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

impl ModelResponse {
    /// Parse the content as JSON, for judges that demand structured replies.
    pub fn as_json(&self) -> Result<Value, ClientError> {
        serde_json::from_str(&self.content)
            .map_err(|e| ClientError::InvalidResponse(format!("expected JSON response: {}", e)))
    }
}

/// Abstraction over an LLM provider.
///
/// `model_id` is passed per call: one client instance serves both the
/// agent under test and the judge, which usually run different models.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a conversation to the model and return its reply.
    async fn invoke(
        &self,
        conversation: &[Turn],
        model_id: &str,
        system_prompt: Option<&str>,
    ) -> Result<ModelResponse, ClientError>;

    /// Provider name, for logging.
    fn provider(&self) -> &str;
}

/// Convenience for single-prompt calls such as judge invocations.
pub async fn invoke_prompt(
    client: &dyn ModelClient,
    prompt: &str,
    model_id: &str,
    system_prompt: Option<&str>,
) -> Result<ModelResponse, ClientError> {
    let conversation = [Turn::user(prompt)];
    client.invoke(&conversation, model_id, system_prompt).await
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: reqwest::Client::new(),
            max_tokens: 4096,
            temperature: 0.1,
        }
    }

    /// Override the API endpoint, used in tests against a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_messages(conversation: &[Turn]) -> Vec<Value> {
        conversation
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Agent => "assistant",
                };
                serde_json::json!({
                    "role": role,
                    "content": turn.content,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn invoke(
        &self,
        conversation: &[Turn],
        model_id: &str,
        system_prompt: Option<&str>,
    ) -> Result<ModelResponse, ClientError> {
        let start = Instant::now();

        let mut body = serde_json::json!({
            "model": model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": Self::build_messages(conversation),
        });
        if let Some(system) = system_prompt {
            body["system"] = Value::String(system.to_string());
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimitExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::ApiError(format!("{}: {}", status, body)));
        }

        let json: Value = response.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        if let Some(blocks) = json["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        content.push_str(block["text"].as_str().unwrap_or(""));
                    }
                    Some("tool_use") => {
                        tool_calls.push(ToolCall {
                            name: block["name"].as_str().unwrap_or("").to_string(),
                            arguments: block["input"].clone(),
                            id: block["id"].as_str().map(String::from),
                        });
                    }
                    _ => {}
                }
            }
        }
        if content.is_empty() && tool_calls.is_empty() {
            return Err(ClientError::InvalidResponse(
                "no content blocks in response".to_string(),
            ));
        }

        let usage = json.get("usage").map(|u| TokenUsage {
            input_tokens: u["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: u["output_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(ModelResponse {
            content,
            tool_calls,
            usage,
            model: model_id.to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn provider(&self) -> &str {
        "anthropic"
    }
}

/// Exponential backoff with jitter for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before the given retry attempt (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.max_delay);
        let jitter_ms = capped.as_millis() as f64 * self.jitter_factor * rand::thread_rng().gen::<f64>();
        capped + Duration::from_millis(jitter_ms as u64)
    }
}

/// Invoke a model with a per-attempt timeout and retry on transient failures.
///
/// Deterministic failures (malformed response bodies) are returned
/// immediately; rate limits, timeouts, and transport errors are retried
/// up to `policy.max_retries` times with jittered exponential backoff.
pub async fn invoke_with_retry(
    client: &Arc<dyn ModelClient>,
    conversation: &[Turn],
    model_id: &str,
    system_prompt: Option<&str>,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<ModelResponse, ClientError> {
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(
            timeout,
            client.invoke(conversation, model_id, system_prompt),
        )
        .await;

        let error = match result {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => e,
            Err(_) => ClientError::Timeout(timeout),
        };

        if !error.is_retryable() || attempt >= policy.max_retries {
            return Err(error);
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            model_id,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "model invocation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ModelClient for FlakyClient {
        async fn invoke(
            &self,
            _conversation: &[Turn],
            model_id: &str,
            _system_prompt: Option<&str>,
        ) -> Result<ModelResponse, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(ClientError::RateLimitExceeded)
            } else {
                Ok(ModelResponse {
                    content: "ok".to_string(),
                    tool_calls: Vec::new(),
                    usage: None,
                    model: model_id.to_string(),
                    latency_ms: 0,
                })
            }
        }

        fn provider(&self) -> &str {
            "flaky"
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ModelClient for SlowClient {
        async fn invoke(
            &self,
            _conversation: &[Turn],
            model_id: &str,
            _system_prompt: Option<&str>,
        ) -> Result<ModelResponse, ClientError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(ModelResponse {
                content: "late".to_string(),
                tool_calls: Vec::new(),
                usage: None,
                model: model_id.to_string(),
                latency_ms: 200,
            })
        }

        fn provider(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let client: Arc<dyn ModelClient> = Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        };

        let conversation = [Turn::user("hello")];
        let response = invoke_with_retry(
            &client,
            &conversation,
            "test-model",
            None,
            Duration::from_secs(1),
            &policy,
        )
        .await
        .unwrap();
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let client: Arc<dyn ModelClient> = Arc::new(FlakyClient {
            calls: AtomicU32::new(0),
            fail_first: 10,
        });
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        };

        let conversation = [Turn::user("hello")];
        let result = invoke_with_retry(
            &client,
            &conversation,
            "test-model",
            None,
            Duration::from_secs(1),
            &policy,
        )
        .await;
        assert!(matches!(result, Err(ClientError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced_per_attempt() {
        let client: Arc<dyn ModelClient> = Arc::new(SlowClient);
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        };

        let conversation = [Turn::user("hello")];
        let result = invoke_with_retry(
            &client,
            &conversation,
            "test-model",
            None,
            Duration::from_millis(10),
            &policy,
        )
        .await;
        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_anthropic_client_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "content": [{"type": "text", "text": "The answer is 4."}],
                    "usage": {"input_tokens": 12, "output_tokens": 7}
                }"#,
            )
            .create_async()
            .await;

        let client = AnthropicClient::new("test-key").with_base_url(server.url());
        let conversation = [Turn::user("What is 2+2?")];
        let response = client
            .invoke(&conversation, "claude-test", Some("You are terse."))
            .await
            .unwrap();

        assert_eq!(response.content, "The answer is 4.");
        assert!(response.tool_calls.is_empty());
        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_anthropic_client_parses_tool_use_blocks() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "content": [
                        {"type": "text", "text": "Looking that up."},
                        {"type": "tool_use", "id": "tu_1", "name": "search", "input": {"query": "rust"}}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = AnthropicClient::new("test-key").with_base_url(server.url());
        let conversation = [Turn::user("Search for rust")];
        let response = client
            .invoke(&conversation, "claude-test", None)
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "search");
        assert_eq!(response.tool_calls[0].arguments["query"], "rust");
        assert_eq!(response.tool_calls[0].id.as_deref(), Some("tu_1"));
    }

    #[tokio::test]
    async fn test_anthropic_client_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = AnthropicClient::new("test-key").with_base_url(server.url());
        let conversation = [Turn::user("hi")];
        let result = client.invoke(&conversation, "claude-test", None).await;
        assert!(matches!(result, Err(ClientError::RateLimitExceeded)));
    }

    #[test]
    fn test_token_usage_cost() {
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 500,
        };
        let cost = usage.calculate_cost(0.003, 0.015);
        assert!((cost - 0.0105).abs() < 1e-9);
        assert_eq!(usage.total_tokens(), 1500);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
    }
}
