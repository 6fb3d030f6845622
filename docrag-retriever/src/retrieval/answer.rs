//! Question answering over the vector index.
//!
//! A question is embedded, the closest chunks are pulled from the index, and
//! a prompt built from those chunks plus the question goes to a completion
//! provider. Failures propagate to the caller; nothing is swallowed here.

use crate::error::{RagError, Result, bounded};
use docrag_embed::{CompletionProvider, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::vector_index::{SearchHit, VectorIndex};

pub const DEFAULT_TOP_K: usize = 3;

/// Settings for answering questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Contexts retrieved when the caller does not say
    pub top_k: usize,
    /// Deadline for each embedding or completion call, in seconds
    pub provider_timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            provider_timeout_secs: 60,
        }
    }
}

impl AnswerConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// One chunk handed to the model, with its similarity to the question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub document_id: String,
    pub page: u32,
    pub chunk_index: usize,
    pub text: String,
    pub score: f64,
}

impl From<SearchHit> for RetrievedContext {
    fn from(hit: SearchHit) -> Self {
        Self {
            document_id: hit.metadata.document_id,
            page: hit.metadata.page,
            chunk_index: hit.metadata.chunk_index,
            text: hit.metadata.text,
            score: hit.score,
        }
    }
}

/// A generated answer and the contexts it was generated from, best first
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer_text: String,
    pub contexts: Vec<RetrievedContext>,
}

/// Render the prompt sent to the completion provider.
///
/// Each context appears as `[p{page}] {text}`, separated by blank lines.
pub fn build_prompt(question: &str, contexts: &[RetrievedContext]) -> String {
    let context_text = contexts
        .iter()
        .map(|c| format!("[p{}] {}", c.page, c.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Answer the question using the reference material below.\n\n\
         ### Context\n{context_text}\n\n\
         ### Question\n{question}\n"
    )
}

/// Embeds questions, searches the shared index and asks the model
pub struct AnswerPipeline {
    config: AnswerConfig,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn CompletionProvider>,
}

impl std::fmt::Debug for AnswerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .field("generator", &self.generator.provider_name())
            .finish()
    }
}

impl AnswerPipeline {
    pub fn new(
        config: AnswerConfig,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            config,
            index,
            embedder,
            generator,
        }
    }

    pub fn config(&self) -> &AnswerConfig {
        &self.config
    }

    /// Find the `top_k` chunks closest to `question`, best first.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedContext>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::invalid_argument("question must not be empty"));
        }
        if top_k == 0 {
            return Err(RagError::invalid_argument("top_k must be at least 1"));
        }

        let query = bounded(
            "question embedding",
            self.config.provider_timeout(),
            self.embedder.embed_text(question),
        )
        .await?;

        let hits = self.index.search(&query, top_k).await?;
        debug!("Retrieved {} contexts for question", hits.len());
        Ok(hits.into_iter().map(RetrievedContext::from).collect())
    }

    /// Answer `question` from the `top_k` most similar chunks.
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<Answer> {
        let contexts = self.retrieve(question, top_k).await?;
        let prompt = build_prompt(question.trim(), &contexts);

        info!(
            "Generating answer with {} from {} contexts",
            self.generator.model_name(),
            contexts.len()
        );
        let answer_text = bounded(
            "answer generation",
            self.config.provider_timeout(),
            self.generator.complete(&prompt),
        )
        .await?;

        Ok(Answer {
            answer_text,
            contexts,
        })
    }
}
