//! Embedding provider trait and implementations

use crate::config::{EmbedConfig, EmbedProviderKind};
use crate::error::{EmbedError, Result};
use crate::gemini::GeminiEmbedProvider;
use crate::openai::OpenAiEmbedProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// Fixed text embedded once at startup to discover the vector width.
pub const PROBE_TEXT: &str = "dimension probe";

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when
    /// there are none.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Get the model this provider embeds with
    fn model_name(&self) -> &str;
}

/// Embed [`PROBE_TEXT`] and return the width of the vector.
///
/// Called once at startup; the width fixes the vector index dimension.
pub async fn probe_dimension(provider: &dyn EmbeddingProvider) -> Result<usize> {
    let vector = provider.embed_text(PROBE_TEXT).await?;
    if vector.is_empty() {
        return Err(EmbedError::malformed(format!(
            "{} returned an empty probe embedding",
            provider.provider_name()
        )));
    }
    tracing::info!(
        "Probed {} ({}) embedding dimension: {}",
        provider.provider_name(),
        provider.model_name(),
        vector.len()
    );
    Ok(vector.len())
}

/// Reject vectors that are empty or carry NaN/infinite components.
pub(crate) fn check_vector(provider: &str, vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(EmbedError::malformed(format!(
            "{provider} returned an empty embedding"
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbedError::malformed(format!(
            "{provider} returned non-finite values in embedding"
        )));
    }
    Ok(())
}

/// Build the provider selected by `config`.
pub async fn create_embedding_provider(
    config: &EmbedConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    tracing::info!(
        "Initializing {:?} embedding provider for model: {}",
        config.provider,
        config.model_name()
    );
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbedProviderKind::OpenAi => Arc::new(OpenAiEmbedProvider::new(config)?),
        EmbedProviderKind::Gemini => Arc::new(GeminiEmbedProvider::new(config)?),
        EmbedProviderKind::FastEmbed => Arc::new(FastEmbedProvider::create(config).await?),
    };
    Ok(provider)
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    model_name: String,
    model: Arc<Mutex<TextEmbedding>>,
    batch_size: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Load the configured model on the blocking pool.
    ///
    /// The first call downloads the model files into fastembed's cache.
    pub async fn create(config: &EmbedConfig) -> Result<Self> {
        let model_name = config.model_name().to_string();
        let model_kind = Self::resolve_model(&model_name)?;

        let loading_name = model_name.clone();
        let model = tokio::task::spawn_blocking(move || -> Result<TextEmbedding> {
            tracing::info!("Loading embedding model: {}", loading_name);
            let init_options = InitOptions::new(model_kind).with_show_download_progress(true);
            TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)
        })
        .await??;

        tracing::info!("Model {} loaded successfully", model_name);
        Ok(Self {
            model_name,
            model: Arc::new(Mutex::new(model)),
            batch_size: config.batch_size,
        })
    }

    /// Map a configured model name onto a built-in fastembed model
    pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
        match name.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
            "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
            other => Err(EmbedError::invalid_config(format!(
                "unsupported fastembed model: {other}"
            ))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model = Arc::clone(&self.model);

            let batch = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut model_guard = model.lock().map_err(|_| {
                    EmbedError::embedding_gen(anyhow::anyhow!("embedding model lock poisoned"))
                })?;
                model_guard
                    .embed(chunk, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            for embedding in &batch {
                check_vector("fastembed", embedding)?;
            }
            all_embeddings.extend(batch);
        }

        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
