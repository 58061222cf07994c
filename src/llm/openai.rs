// OpenAI-compatible chat completion adapter
// Works against OpenAI, Groq and OpenRouter, which share the
// `/chat/completions` wire format.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use crate::utils::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Failure of a single HTTP attempt; only transport errors and 5xx/429 are retried.
#[derive(Debug)]
struct AttemptError {
    retryable: bool,
    message: String,
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl OpenAIAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, OPENAI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn send_once(&self, body: &ChatRequest<'_>) -> Result<ChatResponse, AttemptError> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError {
                retryable: true,
                message: format!("chat completion request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let retryable = status.is_server_error() || status.as_u16() == 429;

            let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(parsed) => format!(
                    "API error ({}): {} (type: {:?})",
                    status, parsed.error.message, parsed.error.error_type
                ),
                Err(_) => format!("API error ({}): {}", status, error_text),
            };
            return Err(AttemptError { retryable, message });
        }

        response.json::<ChatResponse>().await.map_err(|e| AttemptError {
            retryable: false,
            message: format!("Failed to parse chat completion response: {}", e),
        })
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: &m.role,
            content: &m.content,
        }));

        let body = ChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = with_retry(
            || self.send_once(&body),
            self.max_retries,
            Duration::from_millis(500),
            |e: &AttemptError| e.retryable,
        )
        .await
        .map_err(|e| AppError::Generation(e.message))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Generation("completion returned no choices".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request() -> LLMRequest {
        LLMRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![LLMMessage::user("Query: hi")],
            max_tokens: Some(32),
            temperature: Some(0.0),
            system_instruction: Some("classify".to_string()),
        }
    }

    #[test]
    fn test_api_base_is_normalized() {
        let adapter = OpenAIAdapter::new_with_api_base("k", "http://localhost:9999/v1/");
        assert_eq!(adapter.api_base(), "http://localhost:9999/v1");
        assert_eq!(OpenAIAdapter::new("k").api_base(), OPENAI_API_BASE);
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "classify"},
                    {"role": "user", "content": "Query: hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"chat"},"finish_reason":"stop"}],
                    "usage":{"prompt_tokens":10,"completion_tokens":1,"total_tokens":11}}"#,
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new_with_api_base("test-key", &server.url());
        let response = adapter.create_chat_completion(&request()).await.unwrap();

        assert_eq!(response.content, "chat");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 11);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#)
            .expect(1)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new_with_api_base("nope", &server.url()).with_max_retries(3);
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();

        assert!(matches!(err, AppError::Generation(ref m) if m.contains("bad key")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new_with_api_base("k", &server.url()).with_max_retries(1);
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();

        assert!(matches!(err, AppError::Generation(_)));
        mock.assert_async().await;
    }
}
