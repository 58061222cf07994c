use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LLMConfig;
use crate::llm::openai::{OpenAIAdapter, GROQ_API_BASE, OPENAI_API_BASE, OPENROUTER_API_BASE};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Grounded text generation: one system prompt, one user prompt, one completion.
///
/// Used by intent classification, chat composition and plan synthesis.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete_text(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String>;
}

/// Configuration for an LLM provider connection
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub api_base: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl LLMProviderConfig {
    pub fn from_config(config: &LLMConfig) -> Self {
        Self {
            name: config.provider.clone(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        }
    }
}

/// A provider adapter bound to a model and sampling settings.
///
/// Cheap to clone-share behind an `Arc`; it holds no per-request state.
pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig, model: impl Into<String>) -> AppResult<Self> {
        if provider.api_key.is_empty() {
            return Err(AppError::Config(format!(
                "no API key configured for provider {}",
                provider.name
            )));
        }

        let default_base = match provider.name.as_str() {
            "openai" => OPENAI_API_BASE,
            "groq" => GROQ_API_BASE,
            "openrouter" => OPENROUTER_API_BASE,
            other => {
                return Err(AppError::Config(format!("Unsupported provider: {}", other)));
            }
        };
        let api_base = provider.api_base.as_deref().unwrap_or(default_base);

        let adapter = OpenAIAdapter::new_with_api_base(&provider.api_key, api_base)
            .with_timeout(provider.timeout)
            .with_max_retries(provider.max_retries);

        Ok(Self::with_adapter(Box::new(adapter), provider.name, model))
    }

    pub fn with_adapter(
        adapter: Box<dyn LLMAdapter>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
            model: model.into(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}

#[async_trait]
impl TextGenerator for LLM {
    async fn complete_text(&self, system_prompt: &str, user_prompt: &str) -> AppResult<String> {
        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(user_prompt)],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            system_instruction: Some(system_prompt.to_string()),
        };

        let response = self.create_chat_completion(&request).await?;
        if response.finish_reason == "length" {
            warn!(
                provider = %self.provider_name,
                max_tokens = self.max_tokens,
                "Completion hit the token cap and is truncated"
            );
        }
        debug!(
            provider = %self.provider_name,
            finish_reason = %response.finish_reason,
            total_tokens = response.usage.total_tokens,
            "Completion received"
        );
        Ok(response.content)
    }
}

/// Stand-in used when no provider could be built from configuration.
///
/// Every call fails, so the stages that depend on generation degrade instead
/// of the process refusing to start.
pub struct UnconfiguredGenerator {
    reason: String,
}

impl UnconfiguredGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn complete_text(&self, _system_prompt: &str, _user_prompt: &str) -> AppResult<String> {
        Err(AppError::Generation(format!("LLM unavailable: {}", self.reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;
    use std::sync::Mutex;

    struct RecordingAdapter {
        seen: Mutex<Vec<LLMRequest>>,
    }

    #[async_trait]
    impl LLMAdapter for RecordingAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LLMResponse {
                content: "done".to_string(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn provider(name: &str, key: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            api_key: key.to_string(),
            api_base: None,
            timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }

    #[test]
    fn test_unsupported_provider_is_an_error() {
        let err = LLM::new(provider("carrier-pigeon", "k"), "m").err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_key_is_an_error() {
        assert!(LLM::new(provider("openai", ""), "gpt-4o-mini").is_err());
        assert!(LLM::new(provider("groq", "gsk"), "llama").is_ok());
    }

    #[tokio::test]
    async fn test_complete_text_builds_request() {
        let adapter = std::sync::Arc::new(RecordingAdapter {
            seen: Mutex::new(Vec::new()),
        });

        struct Shared(std::sync::Arc<RecordingAdapter>);

        #[async_trait]
        impl LLMAdapter for Shared {
            async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
                self.0.create_chat_completion(request).await
            }
        }

        let llm = LLM::with_adapter(Box::new(Shared(adapter.clone())), "openai", "gpt-4o-mini")
            .with_temperature(0.0)
            .with_max_tokens(16);

        let out = llm.complete_text("be brief", "hello").await.unwrap();
        assert_eq!(out, "done");

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].max_tokens, Some(16));
        assert_eq!(seen[0].system_instruction.as_deref(), Some("be brief"));
        assert_eq!(seen[0].messages, vec![LLMMessage::user("hello")]);
    }

    #[tokio::test]
    async fn test_unconfigured_generator_fails_every_call() {
        let generator = UnconfiguredGenerator::new("no API key configured for provider openai");
        let err = generator.complete_text("sys", "user").await.unwrap_err();
        assert!(matches!(err, AppError::Generation(ref m) if m.contains("no API key")));
    }
}
