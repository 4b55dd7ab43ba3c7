/// LLM Client: the single point of entry for all Claude API calls in Curator.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Callers depend on the `LanguageModel` trait so they can be driven by fakes in tests.
///
/// This client performs no retries of its own. Retry policy belongs to the caller
/// and branches on `LlmError::kind()`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Curator.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

/// Coarse classification of a failed call. The relevance scorer retries
/// `Timeout` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Timeout,
    RateLimited,
    Malformed,
    Other,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::Timeout(_) => LlmErrorKind::Timeout,
            LlmError::Http(e) if e.is_timeout() => LlmErrorKind::Timeout,
            LlmError::Http(e) if e.is_decode() => LlmErrorKind::Malformed,
            LlmError::Http(_) => LlmErrorKind::Other,
            LlmError::Api { status, .. } => match status {
                408 | 504 => LlmErrorKind::Timeout,
                429 => LlmErrorKind::RateLimited,
                400..=499 => LlmErrorKind::Malformed,
                _ => LlmErrorKind::Other,
            },
            LlmError::Parse(_) | LlmError::EmptyContent => LlmErrorKind::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One model call: a system instruction, the turns, and an optional temperature.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn single_turn(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Anything that can answer a chat request with text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Wraps the Anthropic Messages API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, timeout, ANTHROPIC_API_URL)
    }

    pub fn with_base_url(
        api_key: String,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Makes a single raw call to the Claude API, returning the full response object.
    pub async fn call(&self, request: &ChatRequest) -> Result<LlmResponse, LlmError> {
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &request.system,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response
            .json()
            .await
            .map_err(|e| self.classify_transport(e))?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }

    fn classify_transport(&self, error: reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Http(error)
        }
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str, timeout: Duration) -> LlmClient {
        LlmClient::with_base_url("test-key".to_string(), timeout, base_url).unwrap()
    }

    fn text_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 12, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn test_complete_returns_first_text_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("tech|science")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let request = ChatRequest::single_turn("system", "prompt").with_temperature(0.2);
        let text = client.complete(&request).await.unwrap();
        assert_eq!(text, "tech|science");
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client
            .complete(&ChatRequest::single_turn("s", "p"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LlmErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_bad_request_is_malformed_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "messages: field required"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client
            .complete(&ChatRequest::single_turn("s", "p"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LlmErrorKind::Malformed);
        assert!(err.to_string().contains("messages: field required"));
    }

    #[tokio::test]
    async fn test_slow_response_is_classified_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("late"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_millis(200));
        let err = client
            .complete(&ChatRequest::single_turn("s", "p"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), LlmErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_missing_text_block_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [],
                "usage": {"input_tokens": 1, "output_tokens": 0}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), Duration::from_secs(5));
        let err = client
            .complete(&ChatRequest::single_turn("s", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
        assert_eq!(err.kind(), LlmErrorKind::Malformed);
    }

    #[test]
    fn test_gateway_timeout_status_counts_as_timeout() {
        let err = LlmError::Api {
            status: 504,
            message: "upstream timed out".to_string(),
        };
        assert_eq!(err.kind(), LlmErrorKind::Timeout);
    }

    #[test]
    fn test_server_error_is_other() {
        let err = LlmError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.kind(), LlmErrorKind::Other);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
