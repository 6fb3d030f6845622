//! Answer generation providers

use crate::config::{CompletionConfig, CompletionProviderKind};
use crate::error::{EmbedError, Result};
use crate::http::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait implemented by text-generation backends.
///
/// One call, no internal retries. The caller owns deadlines.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate an answer for a fully rendered prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;
}

/// Build the completion provider selected by `config`.
pub fn create_completion_provider(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>> {
    config.validate()?;
    tracing::info!(
        "Initializing {:?} completion provider for model: {}",
        config.provider,
        config.model_name()
    );
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        CompletionProviderKind::OpenAi => Arc::new(OpenAiChatProvider::new(config)?),
        CompletionProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
    };
    Ok(provider)
}

/// Chat completions against an OpenAI-compatible API
#[derive(Debug, Clone)]
pub struct OpenAiChatProvider {
    client: HttpClient,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    system_prompt: String,
}

impl OpenAiChatProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = HttpClient::new(
            "openai",
            config.request_timeout(),
            &[(AUTHORIZATION, format!("Bearer {api_key}"))],
        )?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url()),
            model: config.model_name().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &self.system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChatProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response: ChatResponse =
            self.client.post_json(&self.endpoint, &self.request(prompt)).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| EmbedError::malformed("openai response missing message content"))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: HttpClient,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    system_prompt: String,
}

impl AnthropicProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = HttpClient::new(
            "anthropic",
            config.request_timeout(),
            &[
                (HeaderName::from_static("x-api-key"), api_key),
                (
                    HeaderName::from_static("anthropic-version"),
                    ANTHROPIC_VERSION.to_string(),
                ),
            ],
        )?;
        Ok(Self {
            client,
            endpoint: format!("{}/messages", config.base_url()),
            model: config.model_name().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn request<'a>(&'a self, prompt: &'a str) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(self.system_prompt.as_str()).filter(|s| !s.is_empty()),
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: prompt,
                }],
            }],
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let parsed: AnthropicResponse =
            self.client.post_json(&self.endpoint, &self.request(prompt)).await?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.trim().is_empty() {
            return Err(EmbedError::malformed(
                "anthropic response missing text content",
            ));
        }
        Ok(answer)
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai() -> OpenAiChatProvider {
        OpenAiChatProvider::new(&CompletionConfig::default().with_api_key("sk-test")).unwrap()
    }

    #[test]
    fn test_openai_request_carries_sampling_settings() {
        let provider = openai();
        let json = serde_json::to_value(provider.request("What is the leave policy?")).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "What is the leave policy?");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_openai_response_parsing() {
        let body = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": " Fifteen days. "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(" Fifteen days. ")
        );
    }

    #[test]
    fn test_anthropic_request_shape() {
        let config = CompletionConfig::for_provider(CompletionProviderKind::Anthropic)
            .with_api_key("ak-test");
        let provider = AnthropicProvider::new(&config).unwrap();
        let json = serde_json::to_value(provider.request("hi")).unwrap();

        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][0]["text"], "hi");
        assert!(json["system"].is_string());
        assert_eq!(provider.endpoint, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_anthropic_response_skips_non_text_blocks() {
        let body = r#"{"content": [{"type": "tool_use", "id": "x"}, {"type": "text", "text": "Answer"}]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed.content[0], AnthropicResponseBlock::Other));
        assert!(matches!(
            &parsed.content[1],
            AnthropicResponseBlock::Text { text } if text == "Answer"
        ));
    }

    #[test]
    fn test_factory_rejects_invalid_config() {
        let config = CompletionConfig {
            max_tokens: 0,
            ..CompletionConfig::default().with_api_key("sk-test")
        };
        assert!(create_completion_provider(&config).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY - run with: cargo test test_openai_chat_live -- --ignored
    async fn test_openai_chat_live() -> Result<()> {
        let provider = create_completion_provider(&CompletionConfig::default())?;
        let answer = provider.complete("Reply with the single word: ready").await?;
        assert!(!answer.is_empty());
        Ok(())
    }
}
