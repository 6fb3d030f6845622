//! In-memory vector index with cosine similarity search.
//!
//! Every stored entry is one `(vector, metadata)` record in a single
//! append-only `Vec`, so the Nth vector and the Nth metadata record can never
//! drift apart. Vectors are L2-normalized on the way in, which turns cosine
//! similarity into a plain inner product at query time.
//!
//! ## Concurrency
//!
//! The index is shared as `Arc<VectorIndex>` between the ingestion pipeline
//! and any number of concurrent questions. All state sits behind one
//! [`tokio::sync::RwLock`]: `insert` and `initialize` take the write half,
//! `search` and the read-only accessors take the read half. A reader therefore
//! sees either the whole entry or none of it.
//!
//! ## Search
//!
//! Search is exact brute force with a bounded min-heap of size `top_k`. At
//! the expected scale of a few thousand chunks this is a few milliseconds and
//! needs no approximate structure. Scores are accumulated in `f64`.

use crate::error::{RagError, Result};
use docrag_context::DocumentChunk;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// What is remembered about each indexed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    /// 1-based page number
    pub page: u32,
    /// 0-based index of the chunk within its page
    pub chunk_index: usize,
    /// Raw chunk text, kept for display
    pub text: String,
}

impl From<DocumentChunk> for ChunkMetadata {
    fn from(chunk: DocumentChunk) -> Self {
        Self {
            document_id: chunk.document_id,
            page: chunk.page_number,
            chunk_index: chunk.chunk_index,
            text: chunk.text,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    vector: Vec<f32>,
    metadata: ChunkMetadata,
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Insertion position of the entry
    pub position: usize,
    /// Cosine similarity with the query, in `[-1, 1]`
    pub score: f64,
    pub metadata: ChunkMetadata,
}

/// Summary of what the index currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub dimension: Option<usize>,
    /// Number of distinct document identifiers
    pub documents: usize,
}

#[derive(Debug, Default)]
struct IndexState {
    dimension: Option<usize>,
    entries: Vec<IndexedEntry>,
}

impl IndexState {
    fn check_dimension(&self, actual: usize) -> Result<usize> {
        let expected = self.dimension.ok_or(RagError::NotInitialized)?;
        if expected != actual {
            return Err(RagError::DimensionMismatch { expected, actual });
        }
        Ok(expected)
    }
}

/// Scale `vector` to unit L2 norm.
///
/// Fails with [`RagError::ZeroVector`] when the norm is zero or not finite.
/// Unit vectors come back unchanged up to rounding.
pub fn normalize(vector: &[f32]) -> Result<Vec<f32>> {
    let norm = vector
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(RagError::ZeroVector);
    }
    Ok(vector
        .iter()
        .map(|&v| (f64::from(v) / norm) as f32)
        .collect())
}

fn inner_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

/// Heap candidate; "greater" means a better hit.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    position: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            // earlier insertion wins ties
            .then_with(|| other.position.cmp(&self.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Shared store of embedded chunks
#[derive(Debug, Default)]
pub struct VectorIndex {
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an index with no dimension yet. Call [`initialize`](Self::initialize)
    /// before inserting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index already fixed to `dimension`.
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::invalid_argument("dimension must be at least 1"));
        }
        Ok(Self {
            state: RwLock::new(IndexState {
                dimension: Some(dimension),
                entries: Vec::new(),
            }),
        })
    }

    /// Fix the vector width for this index.
    ///
    /// Calling it again with the same width is a no-op; a different width
    /// fails with [`RagError::AlreadyInitialized`].
    pub async fn initialize(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(RagError::invalid_argument("dimension must be at least 1"));
        }
        let mut state = self.state.write().await;
        match state.dimension {
            Some(existing) if existing == dimension => Ok(()),
            Some(existing) => Err(RagError::AlreadyInitialized {
                existing,
                requested: dimension,
            }),
            None => {
                debug!("Vector index initialized with dimension {}", dimension);
                state.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.dimension
    }

    /// Normalize and append one entry, returning its position.
    pub async fn insert(&self, vector: &[f32], metadata: ChunkMetadata) -> Result<usize> {
        let mut state = self.state.write().await;
        state.check_dimension(vector.len())?;
        let vector = normalize(vector)?;
        let position = state.entries.len();
        state.entries.push(IndexedEntry { vector, metadata });
        Ok(position)
    }

    /// Return up to `top_k` entries most similar to `query`, best first.
    ///
    /// Ties are broken by insertion order. Asking for more entries than are
    /// stored returns all of them.
    pub async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::invalid_argument("top_k must be at least 1"));
        }

        let state = self.state.read().await;
        if state.entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        state.check_dimension(query.len())?;
        let query = normalize(query)?;

        let mut heap: BinaryHeap<Reverse<Candidate>> =
            BinaryHeap::with_capacity(top_k.min(state.entries.len()) + 1);
        for (position, entry) in state.entries.iter().enumerate() {
            let candidate = Candidate {
                score: inner_product(&query, &entry.vector),
                position,
            };
            if heap.len() < top_k {
                heap.push(Reverse(candidate));
            } else if heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(candidate)| SearchHit {
                position: candidate.position,
                score: candidate.score,
                metadata: state.entries[candidate.position].metadata.clone(),
            })
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let documents: HashSet<&str> = state
            .entries
            .iter()
            .map(|e| e.metadata.document_id.as_str())
            .collect();
        IndexStats {
            entries: state.entries.len(),
            dimension: state.dimension,
            documents: documents.len(),
        }
    }

    /// Metadata of every entry in insertion order.
    pub async fn snapshot_metadata(&self) -> Vec<ChunkMetadata> {
        let state = self.state.read().await;
        state.entries.iter().map(|e| e.metadata.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn meta(document_id: &str, chunk_index: usize) -> ChunkMetadata {
        ChunkMetadata {
            document_id: document_id.to_string(),
            page: 1,
            chunk_index,
            text: format!("{document_id}-{chunk_index}"),
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&[3.0, 4.0]).unwrap();
        assert!((once[0] - 0.6).abs() < 1e-6);
        assert!((once[1] - 0.8).abs() < 1e-6);

        let twice = normalize(&once).unwrap();
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_rejects_degenerate_vectors() {
        assert!(matches!(normalize(&[0.0, 0.0]), Err(RagError::ZeroVector)));
        assert!(matches!(normalize(&[]), Err(RagError::ZeroVector)));
        assert!(matches!(
            normalize(&[f32::NAN, 1.0]),
            Err(RagError::ZeroVector)
        ));
    }

    #[tokio::test]
    async fn test_initialize_rules() {
        let index = VectorIndex::new();
        assert!(index.initialize(0).await.is_err());

        index.initialize(3).await.unwrap();
        index.initialize(3).await.unwrap();
        assert!(matches!(
            index.initialize(4).await,
            Err(RagError::AlreadyInitialized {
                existing: 3,
                requested: 4
            })
        ));
        assert_eq!(index.dimension().await, Some(3));
    }

    #[tokio::test]
    async fn test_insert_requires_matching_dimension() {
        let index = VectorIndex::new();
        assert!(matches!(
            index.insert(&[1.0, 0.0], meta("a", 0)).await,
            Err(RagError::NotInitialized)
        ));

        index.initialize(2).await.unwrap();
        assert!(matches!(
            index.insert(&[1.0, 0.0, 0.0], meta("a", 0)).await,
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            index.insert(&[0.0, 0.0], meta("a", 0)).await,
            Err(RagError::ZeroVector)
        ));
        assert!(index.is_empty().await);

        assert_eq!(index.insert(&[1.0, 0.0], meta("a", 0)).await.unwrap(), 0);
        assert_eq!(index.insert(&[0.0, 2.0], meta("a", 1)).await.unwrap(), 1);
        assert_eq!(index.len().await, 2);
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let index = VectorIndex::with_dimension(2).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 3).await,
            Err(RagError::EmptyIndex)
        ));
    }

    #[tokio::test]
    async fn test_search_rejects_zero_top_k() {
        let index = VectorIndex::with_dimension(2).unwrap();
        index.insert(&[1.0, 0.0], meta("a", 0)).await.unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 0).await,
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_then_search_round_trip() {
        let index = VectorIndex::with_dimension(3).unwrap();
        index.insert(&[0.2, 0.5, 0.9], meta("handbook", 0)).await.unwrap();

        let hits = index.search(&[0.2, 0.5, 0.9], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata, meta("handbook", 0));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_orders_by_score_then_position() {
        let index = VectorIndex::with_dimension(2).unwrap();
        index.insert(&[0.0, 1.0], meta("a", 0)).await.unwrap();
        index.insert(&[1.0, 0.0], meta("a", 1)).await.unwrap();
        index.insert(&[1.0, 1.0], meta("a", 2)).await.unwrap();
        index.insert(&[2.0, 0.0], meta("a", 3)).await.unwrap();

        let hits = index.search(&[1.0, 0.0], 10).await.unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        // positions 1 and 3 tie at 1.0; the earlier one comes first
        assert_eq!(positions, vec![1, 3, 2, 0]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let top2 = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(
            top2.iter().map(|h| h.position).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[tokio::test]
    async fn test_search_checks_query_dimension() {
        let index = VectorIndex::with_dimension(2).unwrap();
        index.insert(&[1.0, 0.0], meta("a", 0)).await.unwrap();

        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1).await,
            Err(RagError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0], 1).await,
            Err(RagError::ZeroVector)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_keep_alignment() {
        const N: usize = 64;
        let index = Arc::new(VectorIndex::with_dimension(N).unwrap());

        let mut handles = Vec::new();
        for i in 0..N {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                // mostly along axis i, with a shared component
                let mut vector = vec![0.1f32; N];
                vector[i] = 1.0 + i as f32;
                index.insert(&vector, meta(&format!("doc{i}"), i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let query = vec![1.0f32; N];
        let hits = index.search(&query, N).await.unwrap();
        assert_eq!(hits.len(), N);

        let normalized_query = normalize(&query).unwrap();
        let mut seen = HashSet::new();
        for hit in &hits {
            let i = hit.metadata.chunk_index;
            assert_eq!(hit.metadata.document_id, format!("doc{i}"));
            let mut original = vec![0.1f32; N];
            original[i] = 1.0 + i as f32;
            let expected = inner_product(&normalized_query, &normalize(&original).unwrap());
            assert!((hit.score - expected).abs() < 1e-5);
            seen.insert(i);
        }
        assert_eq!(seen.len(), N);

        let stats = index.stats().await;
        assert_eq!(stats.entries, N);
        assert_eq!(stats.documents, N);
        assert_eq!(stats.dimension, Some(N));
    }

    #[tokio::test]
    async fn test_snapshot_metadata_in_insertion_order() {
        let index = VectorIndex::with_dimension(2).unwrap();
        index.insert(&[1.0, 0.0], meta("a", 0)).await.unwrap();
        index.insert(&[0.0, 1.0], meta("b", 0)).await.unwrap();

        let snapshot = index.snapshot_metadata().await;
        assert_eq!(snapshot, vec![meta("a", 0), meta("b", 0)]);
        assert_eq!(index.stats().await.documents, 2);
    }
}
