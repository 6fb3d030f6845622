use clap::{Parser, Subcommand};
use docrag_embed::{EmbeddingProvider, create_completion_provider, create_embedding_provider};
use docrag_retriever::{
    config::RagConfig,
    retrieval::{
        answer::{Answer, AnswerPipeline},
        extract::CompositeExtractor,
        ingestion::{IngestionPipeline, IngestionReport},
        vector_index::{IndexStats, VectorIndex},
    },
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Ask questions about a folder of PDF documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the chunk window length in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Override the characters shared by consecutive chunks
    #[arg(long, global = true)]
    overlap: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest every document in a directory and report per-document results
    Ingest {
        /// Directory containing the documents
        dir: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Ingest a directory, then answer one question
    Ask {
        /// Directory containing the documents
        dir: PathBuf,
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Ingest a directory, then answer questions read from stdin
    Chat {
        /// Directory containing the documents
        dir: PathBuf,
        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct IngestOutput<'a> {
    report: &'a IngestionReport,
    index: IndexStats,
}

/// The ingestion pipeline plus what answering shares with it
struct Session {
    ingestion: IngestionPipeline,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = RagConfig::load_or_default(args.config.as_deref())?;
    if let Some(chunk_size) = args.chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.chunking.overlap = overlap;
    }

    match args.command {
        Commands::Ingest { dir, format } => {
            let session = open_session(&config).await?;
            let report = session.ingestion.ingest(&dir).await?;
            let stats = session.ingestion.index().stats().await;

            match format {
                OutputFormat::Json => {
                    let output = IngestOutput {
                        report: &report,
                        index: stats,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => print_report(&dir, &report, &stats),
            }

            if report.halted {
                anyhow::bail!("ingestion halted: embedding dimension changed");
            }
            Ok(())
        }
        Commands::Ask {
            dir,
            question,
            top_k,
            format,
        } => {
            if let Some(top_k) = top_k {
                config.answer.top_k = top_k;
            }
            let session = open_session(&config).await?;
            let answers = session.answer_pipeline(&config)?;
            ingest_quietly(&session, &dir).await?;

            let answer = answers.answer(&question, config.answer.top_k).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
                OutputFormat::Summary => print_answer(&answer),
            }
            Ok(())
        }
        Commands::Chat { dir, top_k } => {
            if let Some(top_k) = top_k {
                config.answer.top_k = top_k;
            }
            let session = open_session(&config).await?;
            let answers = session.answer_pipeline(&config)?;
            ingest_quietly(&session, &dir).await?;
            chat(&answers).await
        }
    }
}

async fn open_session(config: &RagConfig) -> anyhow::Result<Session> {
    config.validate()?;

    let embedder = create_embedding_provider(&config.embedding).await?;
    let index = Arc::new(VectorIndex::new());

    let ingestion = IngestionPipeline::new(
        config.ingestion_config()?,
        index.clone(),
        embedder.clone(),
        Arc::new(CompositeExtractor::default()),
    );

    Ok(Session {
        ingestion,
        index,
        embedder,
    })
}

impl Session {
    /// The completion provider is only created here, so `ingest` never needs its key.
    fn answer_pipeline(&self, config: &RagConfig) -> anyhow::Result<AnswerPipeline> {
        let generator = create_completion_provider(&config.generation)?;
        Ok(AnswerPipeline::new(
            config.answer,
            self.index.clone(),
            self.embedder.clone(),
            generator,
        ))
    }
}

/// Ingest for `ask` and `chat`: log a one-line summary instead of the full report.
async fn ingest_quietly(session: &Session, dir: &Path) -> anyhow::Result<()> {
    let report = session.ingestion.ingest(dir).await?;
    for outcome in report.documents.iter().filter(|d| !d.succeeded()) {
        tracing::warn!(
            "Skipped {}: {}",
            outcome.document_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    tracing::info!(
        "Indexed {} chunks from {} of {} documents",
        report.chunks_indexed,
        report.succeeded(),
        report.documents.len()
    );
    if report.halted {
        anyhow::bail!("ingestion halted: embedding dimension changed");
    }
    Ok(())
}

async fn chat(answers: &AnswerPipeline) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    print!("> ");
    stdout.flush()?;
    while let Some(question) = lines.next_line().await? {
        if !question.trim().is_empty() {
            match answers.answer(&question, answers.config().top_k).await {
                Ok(answer) => print_answer(&answer),
                // One bad question does not end the session
                Err(e) => eprintln!("Error: {e}"),
            }
        }
        print!("> ");
        stdout.flush()?;
    }
    println!();
    Ok(())
}

fn print_report(dir: &Path, report: &IngestionReport, stats: &IndexStats) {
    println!("Ingested {}", dir.display());
    println!("{}", "=".repeat(50));
    for outcome in &report.documents {
        match &outcome.error {
            None => println!(
                "  ✓ {} ({} pages, {} chunks, {:.2}s)",
                outcome.document_id,
                outcome.pages,
                outcome.chunks_indexed,
                outcome.processing_time.as_secs_f64()
            ),
            Some(error) => println!(
                "  ✗ {} [{:?}] {}",
                outcome.document_id, outcome.state, error
            ),
        }
    }
    println!();
    println!(
        "Documents: {} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    println!("Chunks indexed: {}", report.chunks_indexed);
    match stats.dimension {
        Some(dimension) => println!(
            "Index: {} entries from {} documents, dimension {}",
            stats.entries, stats.documents, dimension
        ),
        None => println!("Index: empty"),
    }
    if report.halted {
        println!("Ingestion halted before all documents were processed");
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer_text.trim());
    println!();
    println!("References:");
    for context in &answer.contexts {
        let preview: String = context.text.chars().take(100).collect();
        let preview = preview.replace('\n', " ");
        println!(
            "  [page {}] {} (score {:.3}): {}...",
            context.page, context.document_id, context.score, preview
        );
    }
}
