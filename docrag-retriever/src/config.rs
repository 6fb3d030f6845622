//! File-based configuration for the `docrag` binary.
//!
//! ```toml
//! [embedding]
//! provider = "openai"
//! model_name = "text-embedding-3-small"
//!
//! [generation]
//! provider = "openai"
//! temperature = 0.2
//!
//! [chunking]
//! chunk_size = 400
//! overlap = 80
//!
//! [ingestion]
//! extensions = ["pdf"]
//! max_concurrent_documents = 4
//!
//! [answer]
//! top_k = 3
//! ```
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! API keys are read from the environment by the providers.

use crate::error::{RagError, Result};
use crate::retrieval::answer::AnswerConfig;
use crate::retrieval::chunking_strategy::ChunkingConfig;
use crate::retrieval::ingestion::IngestionConfig;
use docrag_embed::{CompletionConfig, EmbedConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// `[ingestion]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
    pub extensions: Vec<String>,
    pub max_concurrent_documents: usize,
    pub provider_timeout_secs: u64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["pdf".to_string()],
            max_concurrent_documents: 4,
            provider_timeout_secs: 30,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub embedding: EmbedConfig,
    pub generation: CompletionConfig,
    pub chunking: ChunkingConfig,
    pub ingestion: IngestionSettings,
    pub answer: AnswerConfig,
}

impl RagConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            RagError::Config { message, .. } => RagError::Config {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RagError::Config {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Ingestion settings with a validated chunking window.
    pub fn ingestion_config(&self) -> Result<IngestionConfig> {
        let window = self.chunking.window_config()?;
        Ok(IngestionConfig::new()
            .with_extensions(self.ingestion.extensions.iter().cloned())
            .with_chunking(window)
            .with_max_concurrent_documents(self.ingestion.max_concurrent_documents)
            .with_provider_timeout(Duration::from_secs(self.ingestion.provider_timeout_secs)))
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<()> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.chunking.window_config()?;
        if self.ingestion.extensions.is_empty() {
            return Err(RagError::invalid_argument(
                "ingestion.extensions must list at least one extension",
            ));
        }
        if self.ingestion.provider_timeout_secs == 0 || self.answer.provider_timeout_secs == 0 {
            return Err(RagError::invalid_argument(
                "provider timeouts must be at least 1 second",
            ));
        }
        if self.answer.top_k == 0 {
            return Err(RagError::invalid_argument("answer.top_k must be at least 1"));
        }
        Ok(())
    }
}
