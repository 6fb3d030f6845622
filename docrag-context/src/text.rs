//! Fixed-size, overlapping text windows for embedding.
//!
//! Page text extracted from a document is cut into windows of `chunk_size`
//! characters. Consecutive windows share `overlap` characters so that a
//! sentence straddling a boundary is still seen whole by at least one window.
//!
//! The module defines:
//! - [`WindowConfig`]: validated window geometry.
//! - [`WindowChunker`]: produces a lazy [`Windows`] iterator over a text.
//! - [`TextWindow`]: one borrowed window with its character offsets.
//! - [`DocumentChunk`]: an owned window tagged with its document and page.
//!
//! Sizes and offsets are counted in characters (Unicode scalar values), not
//! bytes, so a window never splits a multi-byte character.
//!
//! # Degenerate windows
//!
//! A whitespace-only window ends the sequence and is not emitted. So does a
//! window that is not the first one and is shorter than `overlap`: it would
//! only repeat the tail of the previous window.
//!
//! # Example
//!
//! ```
//! use docrag_context::text::{WindowChunker, WindowConfig};
//!
//! let chunker = WindowChunker::new(WindowConfig::new(400, 80).unwrap());
//! let page = "x".repeat(1000);
//!
//! let spans: Vec<(usize, usize)> = chunker.windows(&page).map(|w| (w.start, w.end)).collect();
//! assert_eq!(spans, vec![(0, 400), (320, 720), (640, 1000)]);
//! ```
use serde::Serialize;

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 400;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_OVERLAP: usize = 80;

/// Errors raised while configuring the chunker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// The window would never advance, or would be empty.
    #[error("invalid window: chunk_size ({chunk_size}) must be greater than overlap ({overlap})")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// Window geometry for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowConfig {
    chunk_size: usize,
    overlap: usize,
}

impl WindowConfig {
    /// Create a window configuration.
    ///
    /// # Errors
    /// Returns [`ChunkError::InvalidWindow`] when `chunk_size <= overlap`, since
    /// the cursor would then never move forward.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 || chunk_size <= overlap {
            return Err(ChunkError::InvalidWindow {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance the cursor advances between windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// A single window borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextWindow<'a> {
    /// Position of this window in the emitted sequence (0-indexed).
    pub index: usize,
    /// Character offset where the window starts.
    pub start: usize,
    /// Character offset one past the last character of the window.
    pub end: usize,
    /// The window text.
    pub text: &'a str,
}

impl TextWindow<'_> {
    /// Length of the window in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Splits text into overlapping windows.
///
/// The chunker holds no per-text state, so calling [`windows`](Self::windows)
/// twice on the same text yields the same sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowChunker {
    config: WindowConfig,
}

impl WindowChunker {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    /// Lazily iterate over the windows of `text`.
    pub fn windows<'a>(&self, text: &'a str) -> Windows<'a> {
        Windows {
            text,
            config: self.config,
            byte_cursor: 0,
            char_cursor: 0,
            emitted: 0,
            finished: text.is_empty(),
        }
    }
}

/// Iterator returned by [`WindowChunker::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    text: &'a str,
    config: WindowConfig,
    byte_cursor: usize,
    char_cursor: usize,
    emitted: usize,
    finished: bool,
}

impl<'a> Windows<'a> {
    /// Byte offset reached by moving `chars` characters forward from the cursor,
    /// clipped to the end of the text. Also returns how many characters were
    /// actually crossed.
    fn advance_from_cursor(&self, chars: usize) -> (usize, usize) {
        let rest = &self.text[self.byte_cursor..];
        match rest.char_indices().nth(chars) {
            Some((offset, _)) => (self.byte_cursor + offset, chars),
            None => (self.text.len(), rest.chars().count()),
        }
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = TextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let (end_byte, window_chars) = self.advance_from_cursor(self.config.chunk_size);
        let text = &self.text[self.byte_cursor..end_byte];
        let start = self.char_cursor;
        let end = start + window_chars;

        if text.trim().is_empty() || (self.emitted > 0 && window_chars < self.config.overlap) {
            self.finished = true;
            return None;
        }

        let (next_byte, stepped) = self.advance_from_cursor(self.config.step());
        self.byte_cursor = next_byte;
        self.char_cursor += stepped;
        if self.byte_cursor >= self.text.len() {
            self.finished = true;
        }

        let window = TextWindow {
            index: self.emitted,
            start,
            end,
            text,
        };
        self.emitted += 1;
        Some(window)
    }
}

impl std::iter::FusedIterator for Windows<'_> {}

/// Split `text` into owned window strings.
///
/// # Errors
/// Fails immediately with [`ChunkError::InvalidWindow`] when
/// `chunk_size <= overlap`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    let chunker = WindowChunker::new(WindowConfig::new(chunk_size, overlap)?);
    Ok(chunker.windows(text).map(|w| w.text.to_string()).collect())
}

/// A window of page text tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentChunk {
    /// Identifier of the source document.
    pub document_id: String,
    /// Page number within the document (1-based).
    pub page_number: u32,
    /// Index of this chunk within its page (0-based).
    pub chunk_index: usize,
    /// Character offset of the chunk within the page.
    pub start: usize,
    /// Character offset one past the end of the chunk.
    pub end: usize,
    /// The chunk text.
    pub text: String,
}

/// Window one page of a document into [`DocumentChunk`]s.
pub fn chunk_page(
    chunker: &WindowChunker,
    document_id: &str,
    page_number: u32,
    page_text: &str,
) -> Vec<DocumentChunk> {
    chunker
        .windows(page_text)
        .map(|window| DocumentChunk {
            document_id: document_id.to_string(),
            page_number,
            chunk_index: window.index,
            start: window.start,
            end: window.end,
            text: window.text.to_string(),
        })
        .collect()
}
