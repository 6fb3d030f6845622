//! End-to-end tests for ingestion and answering
//!
//! These tests drive the real pipelines over text documents in a temporary
//! directory. Pages are separated by form feeds, and the embedding and
//! completion providers are deterministic in-process doubles:
//! - Ingesting a directory into the vector index
//! - Answering from the closest chunks
//! - Error propagation for empty indexes and degenerate vectors

use anyhow::Result;
use async_trait::async_trait;
use docrag_embed::{CompletionProvider, EmbeddingProvider};
use docrag_retriever::{
    RagError,
    config::RagConfig,
    retrieval::{
        answer::{AnswerConfig, AnswerPipeline},
        extract::TextPageExtractor,
        ingestion::{DocumentState, IngestionConfig, IngestionPipeline},
        vector_index::VectorIndex,
    },
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const TOPICS: [&str; 3] = ["leave", "expense", "password"];

/// One axis per topic keyword plus a small bias axis.
///
/// Text containing "void" embeds to the zero vector.
struct TopicEmbedder;

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed_text(&self, text: &str) -> docrag_embed::Result<Vec<f32>> {
        if text.contains("void") {
            return Ok(vec![0.0; TOPICS.len() + 1]);
        }
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = TOPICS
            .iter()
            .map(|topic| lower.matches(topic).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }

    fn provider_name(&self) -> &str {
        "topic"
    }

    fn model_name(&self) -> &str {
        "topic-v1"
    }
}

/// Answers with the first page reference it finds in the prompt.
#[derive(Default)]
struct CitingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionProvider for CitingGenerator {
    async fn complete(&self, prompt: &str) -> docrag_embed::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let citation = prompt
            .lines()
            .find(|line| line.starts_with("[p"))
            .and_then(|line| line.split(']').next())
            .map(|tag| format!("{tag}]"))
            .unwrap_or_else(|| "no context".to_string());
        Ok(format!("See {citation}"))
    }

    fn provider_name(&self) -> &str {
        "citing"
    }

    fn model_name(&self) -> &str {
        "citing-v1"
    }
}

fn text_ingestion(index: Arc<VectorIndex>) -> IngestionPipeline {
    IngestionPipeline::new(
        IngestionConfig::new().with_extensions(["txt", "md"]),
        index,
        Arc::new(TopicEmbedder),
        Arc::new(TextPageExtractor),
    )
}

fn write_pages(dir: &Path, name: &str, pages: &[&str]) -> Result<()> {
    std::fs::write(dir.join(name), pages.join("\x0c"))?;
    Ok(())
}

#[tokio::test]
async fn test_two_long_pages_produce_six_chunks() -> Result<()> {
    let temp_dir = tempdir()?;
    let page = "a".repeat(1000);
    write_pages(temp_dir.path(), "handbook.txt", &[&page, &page])?;

    let index = Arc::new(VectorIndex::new());
    let report = text_ingestion(index.clone()).ingest(temp_dir.path()).await?;

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].document_id, "handbook");
    assert_eq!(report.documents[0].state, DocumentState::Done);
    assert_eq!(report.documents[0].pages, 2);
    assert_eq!(report.chunks_indexed, 6);

    let metadata = index.snapshot_metadata().await;
    assert_eq!(
        metadata.iter().map(|m| (m.page, m.chunk_index)).collect::<Vec<_>>(),
        vec![(1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]
    );

    let stats = index.stats().await;
    assert_eq!(stats.entries, 6);
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.dimension, Some(TOPICS.len() + 1));

    Ok(())
}

#[tokio::test]
async fn test_answer_cites_the_closest_document() -> Result<()> {
    let temp_dir = tempdir()?;
    write_pages(
        temp_dir.path(),
        "leave_policy.txt",
        &[
            "Employees accrue annual leave monthly.",
            "Unused leave carries over. Parental leave is 16 weeks.",
        ],
    )?;
    write_pages(
        temp_dir.path(),
        "expenses.md",
        &["Submit each expense report within 30 days."],
    )?;
    write_pages(
        temp_dir.path(),
        "security.txt",
        &["Rotate your password every 90 days."],
    )?;

    let index = Arc::new(VectorIndex::new());
    let report = text_ingestion(index.clone()).ingest(temp_dir.path()).await?;
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.chunks_indexed, 4);

    let generator = Arc::new(CitingGenerator::default());
    let answers = AnswerPipeline::new(
        AnswerConfig::default(),
        index,
        Arc::new(TopicEmbedder),
        generator.clone(),
    );

    let question = "How many weeks of parental leave, and does leave carry over?";
    let answer = answers.answer(question, 2).await?;

    assert_eq!(answer.contexts.len(), 2);
    assert_eq!(answer.contexts[0].document_id, "leave_policy");
    assert_eq!(answer.contexts[0].page, 2);
    assert!(answer.contexts[0].score >= answer.contexts[1].score);
    assert_eq!(answer.answer_text, "See [p2]");

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Parental leave is 16 weeks."));
    assert!(prompts[0].ends_with(&format!("### Question\n{question}\n")));

    Ok(())
}

#[tokio::test]
async fn test_single_entry_with_larger_top_k() -> Result<()> {
    let temp_dir = tempdir()?;
    write_pages(temp_dir.path(), "memo.txt", &["Expense limits rose this year."])?;

    let index = Arc::new(VectorIndex::new());
    text_ingestion(index.clone()).ingest(temp_dir.path()).await?;

    let answers = AnswerPipeline::new(
        AnswerConfig::default(),
        index,
        Arc::new(TopicEmbedder),
        Arc::new(CitingGenerator::default()),
    );
    let answer = answers.answer("What changed for expense limits?", 3).await?;

    assert_eq!(answer.contexts.len(), 1);
    assert_eq!(answer.contexts[0].document_id, "memo");
    assert_eq!(answer.answer_text, "See [p1]");

    Ok(())
}

#[tokio::test]
async fn test_questions_before_ingestion_fail() -> Result<()> {
    let temp_dir = tempdir()?;
    let index = Arc::new(VectorIndex::new());

    // Nothing matches, so nothing is indexed and no dimension is recorded
    write_pages(temp_dir.path(), "scan.pdf.bak", &["leave"])?;
    let report = text_ingestion(index.clone()).ingest(temp_dir.path()).await?;
    assert!(report.documents.is_empty());
    assert_eq!(index.dimension().await, None);

    let answers = AnswerPipeline::new(
        AnswerConfig::default(),
        index,
        Arc::new(TopicEmbedder),
        Arc::new(CitingGenerator::default()),
    );
    let result = answers.answer("How much leave?", 3).await;
    assert!(matches!(result, Err(RagError::EmptyIndex)));

    Ok(())
}

#[tokio::test]
async fn test_zero_vectors_are_rejected() -> Result<()> {
    let temp_dir = tempdir()?;
    write_pages(temp_dir.path(), "a_policy.txt", &["Annual leave is 25 days."])?;
    write_pages(temp_dir.path(), "b_blank.txt", &["void"])?;

    let index = Arc::new(VectorIndex::new());
    let report = text_ingestion(index.clone()).ingest(temp_dir.path()).await?;

    assert_eq!(report.documents[0].state, DocumentState::Done);
    assert_eq!(report.documents[1].state, DocumentState::Failed);
    assert!(!report.halted);
    assert_eq!(index.len().await, 1);

    let answers = AnswerPipeline::new(
        AnswerConfig::default(),
        index,
        Arc::new(TopicEmbedder),
        Arc::new(CitingGenerator::default()),
    );
    let result = answers.answer("void", 3).await;
    assert!(matches!(result, Err(RagError::ZeroVector)));

    Ok(())
}

#[tokio::test]
async fn test_config_file_drives_ingestion() -> Result<()> {
    let temp_dir = tempdir()?;
    let docs = temp_dir.path().join("docs");
    std::fs::create_dir(&docs)?;
    write_pages(&docs, "notes.md", &[&"b".repeat(250)])?;
    write_pages(&docs, "ignored.txt", &["leave"])?;
    write_pages(&docs, ".hidden.md", &["leave"])?;

    let config_path = temp_dir.path().join("docrag.toml");
    std::fs::write(
        &config_path,
        "[chunking]\nchunk_size = 100\noverlap = 40\n\n[ingestion]\nextensions = [\"md\"]\n",
    )?;
    let config = RagConfig::load(&config_path)?;

    let index = Arc::new(VectorIndex::new());
    let pipeline = IngestionPipeline::new(
        config.ingestion_config()?,
        index.clone(),
        Arc::new(TopicEmbedder),
        Arc::new(TextPageExtractor),
    );
    let report = pipeline.ingest(&docs).await?;

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].document_id, "notes");
    // Windows start at 0, 60, 120 and 180; the 10-character tail at 240 is dropped
    assert_eq!(report.chunks_indexed, 4);

    let stats = pipeline.get_stats().await;
    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.chunks_created, 4);

    Ok(())
}
