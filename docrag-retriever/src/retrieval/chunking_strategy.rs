use super::extract::Page;
use docrag_context::{
    ChunkError, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, DocumentChunk, WindowChunker, WindowConfig,
    chunk_page,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for chunking pages, as written in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Validate into a window configuration
    pub fn window_config(&self) -> Result<WindowConfig, ChunkError> {
        WindowConfig::new(self.chunk_size, self.overlap)
    }
}

/// Strategy for chunking documents - delegates the windowing to docrag-context
#[derive(Debug, Clone, Copy)]
pub struct ChunkingStrategy {
    chunker: WindowChunker,
}

impl ChunkingStrategy {
    /// Create a new chunking strategy with the given window
    pub fn new(config: WindowConfig) -> Self {
        Self {
            chunker: WindowChunker::new(config),
        }
    }

    pub fn window(&self) -> WindowConfig {
        self.chunker.config()
    }

    /// Chunk one page of a document
    pub fn chunk_page(&self, document_id: &str, page: &Page) -> Vec<DocumentChunk> {
        let chunks = chunk_page(&self.chunker, document_id, page.number, &page.text);

        tracing::debug!(
            "Chunked {} page {} into {} chunks (size: {}, overlap: {})",
            document_id,
            page.number,
            chunks.len(),
            self.chunker.config().chunk_size(),
            self.chunker.config().overlap()
        );

        chunks
    }

    /// Check if a file should be ingested based on its path
    pub fn should_index_file(&self, file_path: &Path, extensions: &[String]) -> bool {
        // Skip hidden files and editor droppings like ~$report.pdf
        if let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) {
            if filename.starts_with('.') || filename.starts_with("~$") {
                return false;
            }
        }

        match file_path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}
