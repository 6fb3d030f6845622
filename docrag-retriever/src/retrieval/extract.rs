//! Page extraction: turn a document on disk into numbered page texts.

use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Text of one page. Numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// Source of page text for one kind of document.
///
/// Pages with no extractable text are left out; numbering still follows the
/// document, so a blank page 2 yields pages 1 and 3.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>>;

    fn supports(&self, path: &Path) -> bool;
}

/// Identifier of the document stored at `path`: its file name up to the first `.`.
pub fn document_id(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// PDF pages via `lopdf`, parsed on the blocking pool
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageExtractor;

impl PdfPageExtractor {
    fn extract_blocking(path: PathBuf) -> Result<Vec<Page>> {
        let document =
            lopdf::Document::load(&path).map_err(|e| RagError::extraction(&path, e))?;

        let mut pages = Vec::new();
        for number in document.get_pages().into_keys() {
            match document.extract_text(&[number]) {
                Ok(text) if !text.trim().is_empty() => pages.push(Page { number, text }),
                Ok(_) => debug!("Skipping blank page {} of {}", number, path.display()),
                Err(e) => warn!(
                    "Could not extract text from page {} of {}: {}",
                    number,
                    path.display(),
                    e
                ),
            }
        }
        Ok(pages)
    }
}

#[async_trait]
impl PageExtractor for PdfPageExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::extract_blocking(owned))
            .await
            .map_err(|e| RagError::extraction(path, e))?
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }
}

/// Plain-text documents whose pages are separated by form feeds (`\x0c`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPageExtractor;

#[async_trait]
impl PageExtractor for TextPageExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RagError::extraction(path, e))?;

        Ok(content
            .split('\x0c')
            .zip(1u32..)
            .filter(|(text, _)| !text.trim().is_empty())
            .map(|(text, number)| Page {
                number,
                text: text.to_string(),
            })
            .collect())
    }

    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["txt", "md"])
    }
}

/// Dispatches to the first extractor that supports a path
#[derive(Clone)]
pub struct CompositeExtractor {
    extractors: Vec<Arc<dyn PageExtractor>>,
}

impl std::fmt::Debug for CompositeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeExtractor")
            .field("extractors", &self.extractors.len())
            .finish()
    }
}

impl Default for CompositeExtractor {
    fn default() -> Self {
        Self::new(vec![Arc::new(PdfPageExtractor), Arc::new(TextPageExtractor)])
    }
}

impl CompositeExtractor {
    pub fn new(extractors: Vec<Arc<dyn PageExtractor>>) -> Self {
        Self { extractors }
    }
}

#[async_trait]
impl PageExtractor for CompositeExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<Page>> {
        match self.extractors.iter().find(|e| e.supports(path)) {
            Some(extractor) => extractor.extract_pages(path).await,
            None => Err(RagError::extraction(path, "unsupported file type")),
        }
    }

    fn supports(&self, path: &Path) -> bool {
        self.extractors.iter().any(|e| e.supports(path))
    }
}
