//! Batch ingestion: documents on disk into the shared vector index.
//!
//! This module drives the whole write path of docrag, from a directory of
//! PDFs to embedded chunks in a [`VectorIndex`].
//!
//! ## Pipeline Flow
//!
//! ```text
//! Directory → PageExtractor → ChunkingStrategy → EmbeddingProvider → VectorIndex
//!                  ↑                 ↑                   ↑                ↑
//!               lopdf          docrag-context      HTTP / ONNX      single RwLock
//! ```
//!
//! ## Per-document state
//!
//! Every document walks `Pending → PagesExtracted → ChunksIndexed → Done`, or
//! stops in `Failed`. A failed document is logged with its identifier and
//! the batch moves on. The one exception is a dimension mismatch: the provider
//! no longer agrees with the index, so every document that has not started
//! yet is reported as failed with "ingestion halted".
//!
//! ## Concurrency
//!
//! Documents are processed with bounded concurrency
//! (`max_concurrent_documents`), because embedding calls dominate latency.
//! All index mutations still go through the index's write lock one entry at a
//! time. Every provider call is bounded by `provider_timeout`.

use crate::error::{RagError, Result, bounded};
use docrag_context::WindowConfig;
use docrag_embed::{EmbedError, EmbeddingProvider, probe_dimension};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::chunking_strategy::ChunkingStrategy;
use super::extract::{Page, PageExtractor, document_id};
use super::vector_index::{ChunkMetadata, VectorIndex};

const HALTED: &str = "ingestion halted";

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// File extensions to ingest, matched case-insensitively
    pub extensions: Vec<String>,
    /// Chunking window
    pub chunking: WindowConfig,
    /// Maximum documents processed at once
    pub max_concurrent_documents: usize,
    /// Deadline for each embedding call
    pub provider_timeout: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["pdf".to_string()],
            chunking: WindowConfig::default(),
            max_concurrent_documents: 4,
            provider_timeout: Duration::from_secs(30),
        }
    }
}

impl IngestionConfig {
    /// Create a configuration with defaults: PDF only, 400/80 windows,
    /// 4 documents at a time and a 30 second provider timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_chunking(mut self, chunking: WindowConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Set how many documents may be in flight at once (at least 1).
    pub fn with_max_concurrent_documents(mut self, documents: usize) -> Self {
        self.max_concurrent_documents = documents.max(1);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }
}

/// Where a document got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    PagesExtracted,
    ChunksIndexed,
    Done,
    Failed,
}

/// Result of ingesting a single document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub path: PathBuf,
    pub state: DocumentState,
    /// Pages with extractable text
    pub pages: usize,
    /// Chunks that made it into the index, even if the document later failed
    pub chunks_indexed: usize,
    pub error: Option<String>,
    #[serde(skip)]
    pub processing_time: Duration,
}

impl DocumentOutcome {
    fn pending(path: PathBuf) -> Self {
        Self {
            document_id: document_id(&path),
            path,
            state: DocumentState::Pending,
            pages: 0,
            chunks_indexed: 0,
            error: None,
            processing_time: Duration::ZERO,
        }
    }

    fn advance(&mut self, next: DocumentState) {
        debug!("{}: {:?} -> {:?}", self.document_id, self.state, next);
        self.state = next;
    }

    fn fail(mut self, reason: impl ToString) -> Self {
        self.advance(DocumentState::Failed);
        self.error = Some(reason.to_string());
        self
    }

    pub fn succeeded(&self) -> bool {
        self.state == DocumentState::Done
    }
}

/// Result of one `ingest` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    /// One outcome per candidate file, in file name order
    pub documents: Vec<DocumentOutcome>,
    pub chunks_indexed: usize,
    /// Whether a dimension mismatch stopped the batch
    pub halted: bool,
}

impl IngestionReport {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }
}

/// Running totals across every `ingest` call on one pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub errors: usize,
}

/// Drives extraction, chunking, embedding and insertion for a directory
pub struct IngestionPipeline {
    config: IngestionConfig,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn PageExtractor>,
    chunking_strategy: ChunkingStrategy,
    stats: RwLock<ProcessingStats>,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .finish()
    }
}

impl IngestionPipeline {
    /// Create a pipeline writing into `index`.
    ///
    /// The index is shared: hand the same `Arc` to an
    /// [`AnswerPipeline`](super::answer::AnswerPipeline) to query what was
    /// ingested.
    pub fn new(
        config: IngestionConfig,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        let chunking_strategy = ChunkingStrategy::new(config.chunking);
        Self {
            config,
            index,
            embedder,
            extractor,
            chunking_strategy,
            stats: RwLock::new(ProcessingStats::default()),
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn get_stats(&self) -> ProcessingStats {
        self.stats.read().await.clone()
    }

    /// Ingest every matching file directly inside `dir`.
    ///
    /// Per-document failures are reported, not returned. This only fails when
    /// the directory cannot be listed or the provider's dimension cannot be
    /// established.
    pub async fn ingest(&self, dir: &Path) -> Result<IngestionReport> {
        let files = self.discover(dir).await?;
        info!(
            "Found {} candidate documents in {}",
            files.len(),
            dir.display()
        );
        if files.is_empty() {
            return Ok(IngestionReport::default());
        }

        self.ensure_initialized().await?;

        let halted = AtomicBool::new(false);
        let halted = &halted;
        let mut outcomes: Vec<(usize, DocumentOutcome)> =
            stream::iter(files.into_iter().enumerate())
                .map(|(position, path)| async move {
                    (position, self.process_document(path, halted).await)
                })
                .buffer_unordered(self.config.max_concurrent_documents.max(1))
                .collect()
                .await;
        outcomes.sort_by_key(|(position, _)| *position);

        let documents: Vec<DocumentOutcome> =
            outcomes.into_iter().map(|(_, outcome)| outcome).collect();
        let report = IngestionReport {
            chunks_indexed: documents.iter().map(|d| d.chunks_indexed).sum(),
            halted: halted.load(Ordering::SeqCst),
            documents,
        };

        info!(
            "Ingestion finished: {} succeeded, {} failed, {} chunks indexed",
            report.succeeded(),
            report.failed(),
            report.chunks_indexed
        );
        Ok(report)
    }

    /// List candidate files, sorted by name. Not recursive.
    async fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_file()
                && self
                    .chunking_strategy
                    .should_index_file(&path, &self.config.extensions)
            {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Fix the index dimension from the provider unless it is already set.
    async fn ensure_initialized(&self) -> Result<()> {
        if self.index.dimension().await.is_some() {
            return Ok(());
        }
        let dimension = bounded(
            "dimension probe",
            self.config.provider_timeout,
            probe_dimension(self.embedder.as_ref()),
        )
        .await?;
        self.index.initialize(dimension).await
    }

    async fn process_document(&self, path: PathBuf, halted: &AtomicBool) -> DocumentOutcome {
        let start_time = Instant::now();
        let mut outcome = DocumentOutcome::pending(path);

        if halted.load(Ordering::SeqCst) {
            return self.finish(outcome.fail(HALTED), start_time).await;
        }

        info!(
            "Ingesting document {} ({})",
            outcome.document_id,
            outcome.path.display()
        );

        let pages = match self.extractor.extract_pages(&outcome.path).await {
            Ok(pages) => pages,
            Err(e) => {
                error!("Failed to ingest {}: {}", outcome.document_id, e);
                return self.finish(outcome.fail(e), start_time).await;
            }
        };
        outcome.advance(DocumentState::PagesExtracted);
        outcome.pages = pages.len();

        for page in &pages {
            if halted.load(Ordering::SeqCst) {
                return self.finish(outcome.fail(HALTED), start_time).await;
            }
            if let Err(e) = self
                .index_page(&outcome.document_id, page, &mut outcome.chunks_indexed)
                .await
            {
                if e.is_fatal() {
                    halted.store(true, Ordering::SeqCst);
                    error!(
                        "Halting ingestion at {} page {}: {}",
                        outcome.document_id, page.number, e
                    );
                } else if e.is_timeout() {
                    error!(
                        "Provider timed out ingesting {} at page {} (limit {:?}): {}",
                        outcome.document_id, page.number, self.config.provider_timeout, e
                    );
                } else {
                    error!(
                        "Failed to ingest {} at page {}: {}",
                        outcome.document_id, page.number, e
                    );
                }
                return self.finish(outcome.fail(e), start_time).await;
            }
        }
        outcome.advance(DocumentState::ChunksIndexed);
        self.finish(outcome, start_time).await
    }

    /// Chunk, embed and insert one page, counting inserted chunks as it goes.
    async fn index_page(&self, document_id: &str, page: &Page, indexed: &mut usize) -> Result<()> {
        let chunks = self.chunking_strategy.chunk_page(document_id, page);
        if chunks.is_empty() {
            debug!("Page {} of {} produced no chunks", page.number, document_id);
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = bounded(
            "embedding",
            self.config.provider_timeout,
            self.embedder.embed_texts(&texts),
        )
        .await?;

        if embeddings.len() != chunks.len() {
            return Err(EmbedError::malformed(format!(
                "{} returned {} embeddings for {} chunks",
                self.embedder.provider_name(),
                embeddings.len(),
                chunks.len()
            ))
            .into());
        }

        for (chunk, vector) in chunks.into_iter().zip(embeddings.embeddings) {
            self.index.insert(&vector, ChunkMetadata::from(chunk)).await?;
            *indexed += 1;
        }

        debug!(
            "Indexed page {} of {} ({} chunks)",
            page.number,
            document_id,
            texts.len()
        );
        Ok(())
    }

    /// Record the outcome in the running stats. A document whose chunks are
    /// all indexed is `Done` from here on.
    async fn finish(&self, mut outcome: DocumentOutcome, start_time: Instant) -> DocumentOutcome {
        outcome.processing_time = start_time.elapsed();
        if outcome.state == DocumentState::ChunksIndexed {
            outcome.advance(DocumentState::Done);
        }

        let mut stats = self.stats.write().await;
        stats.chunks_created += outcome.chunks_indexed;
        stats.embeddings_generated += outcome.chunks_indexed;
        if outcome.succeeded() {
            stats.files_processed += 1;
            info!(
                "Ingested {} ({} pages, {} chunks) in {:?}",
                outcome.document_id, outcome.pages, outcome.chunks_indexed, outcome.processing_time
            );
        } else {
            stats.errors += 1;
        }

        outcome
    }
}
