//! Configuration for embedding and completion providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant who knows the organisation's internal documents well. \
Answer using only the supplied context and mention the page references you relied on.";

/// Which embedding backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAi,
    /// Google Generative Language `embedContent` endpoint
    #[default]
    Gemini,
    /// Local ONNX model run through fastembed
    FastEmbed,
}

impl EmbedProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::Gemini => "gemini-embedding-001",
            Self::FastEmbed => "all-MiniLM-L6-v2",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_BASE_URL,
            Self::Gemini => GEMINI_BASE_URL,
            Self::FastEmbed => "",
        }
    }

    fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Gemini => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Self::FastEmbed => &[],
        }
    }
}

/// Which text-generation backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProviderKind {
    /// OpenAI-compatible `/chat/completions` endpoint
    #[default]
    OpenAi,
    /// Anthropic messages API
    Anthropic,
}

impl CompletionProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_BASE_URL,
            Self::Anthropic => ANTHROPIC_BASE_URL,
        }
    }

    fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }
}

/// Configuration for embedding providers
#[derive(Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend to use
    #[builder(default)]
    pub provider: EmbedProviderKind,
    /// Model identifier; the provider default is used when absent
    #[builder(setter(into, strip_option), default)]
    pub model_name: Option<String>,
    /// Base URL of the HTTP API; the provider default is used when absent
    #[builder(setter(into, strip_option), default)]
    pub base_url: Option<String>,
    /// API key; read from the environment when absent
    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Requested output dimensionality, for models that support truncation
    #[builder(setter(strip_option), default)]
    pub dimensions: Option<usize>,
    /// Per-request HTTP timeout in seconds
    #[builder(default = "30")]
    pub request_timeout_secs: u64,
    /// Maximum number of texts sent in one request
    #[builder(default = "16")]
    pub batch_size: usize,
}

impl std::fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name())
            .field("base_url", &self.base_url())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimensions", &self.dimensions)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: EmbedProviderKind::default(),
            model_name: None,
            base_url: None,
            api_key: None,
            dimensions: None,
            request_timeout_secs: 30,
            batch_size: 16,
        }
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Configuration for a given backend with its default model
    pub fn for_provider(provider: EmbedProviderKind) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// OpenAI embeddings with the given model
    pub fn openai(model_name: impl Into<String>) -> Self {
        Self::for_provider(EmbedProviderKind::OpenAi).with_model(model_name)
    }

    /// Gemini embeddings with the given model
    pub fn gemini(model_name: impl Into<String>) -> Self {
        Self::for_provider(EmbedProviderKind::Gemini).with_model(model_name)
    }

    /// Local fastembed model
    pub fn fastembed(model_name: impl Into<String>) -> Self {
        Self::for_provider(EmbedProviderKind::FastEmbed).with_model(model_name)
    }

    pub fn with_model(self, model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            ..self
        }
    }

    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    pub fn with_dimensions(self, dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            request_timeout_secs: timeout.as_secs().max(1),
            ..self
        }
    }

    /// Model identifier, falling back to the provider default
    pub fn model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// API key from the configuration or the provider's environment variables
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_key(
            self.api_key.as_deref(),
            self.provider.api_key_vars(),
            &format!("{:?}", self.provider),
        )
    }

    /// Check the settings that do not require network access
    pub fn validate(&self) -> Result<()> {
        if self.model_name().trim().is_empty() {
            return Err(EmbedError::invalid_config("embedding model name is empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(EmbedError::invalid_config(
                "request_timeout_secs must be at least 1",
            ));
        }
        if self.dimensions == Some(0) {
            return Err(EmbedError::invalid_config("dimensions must be at least 1"));
        }
        Ok(())
    }
}

/// Configuration for completion (answer generation) providers
#[derive(Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct CompletionConfig {
    /// Backend to use
    #[builder(default)]
    pub provider: CompletionProviderKind,
    /// Model identifier; the provider default is used when absent
    #[builder(setter(into, strip_option), default)]
    pub model_name: Option<String>,
    /// Base URL of the HTTP API; the provider default is used when absent
    #[builder(setter(into, strip_option), default)]
    pub base_url: Option<String>,
    /// API key; read from the environment when absent
    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature
    #[builder(default = "0.2")]
    pub temperature: f32,
    /// Maximum tokens in the generated answer
    #[builder(default = "1024")]
    pub max_tokens: usize,
    /// System prompt sent ahead of the user prompt
    #[builder(default = "DEFAULT_SYSTEM_PROMPT.to_string()")]
    pub system_prompt: String,
    /// Per-request HTTP timeout in seconds
    #[builder(default = "60")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name())
            .field("base_url", &self.base_url())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: CompletionProviderKind::default(),
            model_name: None,
            base_url: None,
            api_key: None,
            temperature: 0.2,
            max_tokens: 1024,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    /// Create a new completion configuration using the builder
    pub fn builder() -> CompletionConfigBuilder {
        CompletionConfigBuilder::default()
    }

    pub fn for_provider(provider: CompletionProviderKind) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    pub fn with_model(self, model_name: impl Into<String>) -> Self {
        Self {
            model_name: Some(model_name.into()),
            ..self
        }
    }

    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    pub fn model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_key(
            self.api_key.as_deref(),
            self.provider.api_key_vars(),
            &format!("{:?}", self.provider),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name().trim().is_empty() {
            return Err(EmbedError::invalid_config("completion model name is empty"));
        }
        if self.max_tokens == 0 {
            return Err(EmbedError::invalid_config("max_tokens must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EmbedError::invalid_config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(EmbedError::invalid_config(
                "request_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

fn resolve_key(explicit: Option<&str>, vars: &[&str], provider: &str) -> Result<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    for var in vars {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(value.to_string());
            }
        }
    }
    Err(EmbedError::invalid_config(format!(
        "missing API key for {provider}: set one of {}",
        vars.join(", ")
    )))
}
