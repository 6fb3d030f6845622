//! # docrag-embed
//!
//! The provider gateway for docrag: turns text into embedding vectors and
//! prompts into answers. Every backend sits behind one of two async traits so
//! the retrieval side never knows which vendor it is talking to.
//!
//! ## Features
//!
//! - **Hosted Embeddings**: OpenAI `/embeddings` and Gemini `embedContent`
//! - **Local Embeddings**: ONNX models through FastEmbed, no network needed
//! - **Answer Generation**: OpenAI chat completions and Anthropic messages
//! - **Dimension Probing**: discover the vector width with a single call
//!
//! ## Quick Start
//!
//! ```no_run
//! use docrag_embed::{EmbedConfig, create_embedding_provider, probe_dimension};
//!
//! # async fn example() -> docrag_embed::Result<()> {
//! let provider = create_embedding_provider(&EmbedConfig::default()).await?;
//! let dimension = probe_dimension(provider.as_ref()).await?;
//!
//! let texts = vec!["Annual leave is 15 days".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//! assert_eq!(result.dimension, dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: provider selection, models, keys and sampling settings
//! - [`provider`]: the [`EmbeddingProvider`] trait and the FastEmbed backend
//! - [`openai`] / [`gemini`]: hosted embedding backends
//! - [`completion`]: the [`CompletionProvider`] trait and its backends
//! - [`error`]: error types and result handling
//!
//! API keys are read from `OPENAI_API_KEY`, `GOOGLE_API_KEY` (or
//! `GEMINI_API_KEY`) and `ANTHROPIC_API_KEY` unless set explicitly.
//!
//! Providers never retry. A failed or slow call surfaces as an [`EmbedError`]
//! and the caller decides what to do with it.

pub mod completion;
pub mod config;
pub mod error;
pub mod gemini;
mod http;
pub mod openai;
pub mod provider;

// Re-export main types for easy access
pub use completion::{
    AnthropicProvider, CompletionProvider, OpenAiChatProvider, create_completion_provider,
};
pub use config::{CompletionConfig, CompletionProviderKind, EmbedConfig, EmbedProviderKind};
pub use error::{EmbedError, Result};
pub use gemini::GeminiEmbedProvider;
pub use openai::OpenAiEmbedProvider;
pub use provider::{
    EmbeddingProvider, EmbeddingResult, FastEmbedProvider, PROBE_TEXT, create_embedding_provider,
    probe_dimension,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_builds_hosted_provider() {
        let config = EmbedConfig::openai("text-embedding-3-small").with_api_key("sk-test");
        let provider = create_embedding_provider(&config).await.unwrap();

        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_local_model() {
        let config = EmbedConfig::fastembed("not-a-real-model");
        let err = create_embedding_provider(&config).await.err().unwrap();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }
}
