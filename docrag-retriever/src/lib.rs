//! docrag-retriever: question answering over a folder of PDFs
//!
//! This crate extracts page text from documents, windows it into overlapping
//! chunks, embeds every chunk into an in-memory vector index, and answers
//! questions by retrieving the closest chunks and handing them to a
//! completion model.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Page extraction, chunking, the vector index, ingestion and answering
//! - **[`config`]**: TOML configuration for providers, chunking and ingestion
//! - **[`error`]**: The [`RagError`] taxonomy shared by every operation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docrag_retriever::{
//!     config::RagConfig,
//!     retrieval::{
//!         answer::AnswerPipeline,
//!         extract::CompositeExtractor,
//!         ingestion::IngestionPipeline,
//!         vector_index::VectorIndex,
//!     },
//! };
//! use docrag_embed::{create_completion_provider, create_embedding_provider};
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RagConfig::default();
//! let embedder = create_embedding_provider(&config.embedding).await?;
//! let generator = create_completion_provider(&config.generation)?;
//! let index = Arc::new(VectorIndex::new());
//!
//! let ingestion = IngestionPipeline::new(
//!     config.ingestion_config()?,
//!     index.clone(),
//!     embedder.clone(),
//!     Arc::new(CompositeExtractor::default()),
//! );
//! ingestion.ingest(Path::new("./handbooks")).await?;
//!
//! let answers = AnswerPipeline::new(config.answer, index, embedder, generator);
//! let answer = answers.answer("How many days of annual leave?", 3).await?;
//! println!("{}", answer.answer_text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PDFs → PageExtractor → ChunkingStrategy → EmbeddingProvider → VectorIndex
//!                                                                   ↓
//! Question → EmbeddingProvider → search(top_k) → prompt → CompletionProvider
//! ```

pub mod config;
pub mod error;
pub mod retrieval;

pub use config::RagConfig;
pub use error::{RagError, Result};
