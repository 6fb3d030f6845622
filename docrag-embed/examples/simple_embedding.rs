//! Embed a few sentences with the configured provider and rank them against a query.
//!
//! Uses Gemini by default; pass `openai` or `fastembed` as the first argument
//! to switch backends.

use docrag_embed::{
    EmbedConfig, EmbedProviderKind, EmbeddingProvider, create_embedding_provider, probe_dimension,
};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm(a) * norm(b)).max(f32::EPSILON)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let kind = match std::env::args().nth(1).as_deref() {
        Some("openai") => EmbedProviderKind::OpenAi,
        Some("fastembed") => EmbedProviderKind::FastEmbed,
        _ => EmbedProviderKind::Gemini,
    };
    let config = EmbedConfig::for_provider(kind);
    println!("Provider: {:?}, model: {}", config.provider, config.model_name());

    let provider = create_embedding_provider(&config).await?;
    let dimension = probe_dimension(provider.as_ref()).await?;
    println!("Dimension: {dimension}");

    let texts = vec![
        "Employees receive fifteen days of annual leave.".to_string(),
        "Expense reports are due by the fifth of each month.".to_string(),
        "The office is closed on public holidays.".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;

    let query = provider.embed_text("How many vacation days do I get?").await?;
    let mut ranked: Vec<(f32, &String)> = result
        .embeddings
        .iter()
        .map(|e| cosine(&query, e))
        .zip(&texts)
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (score, text) in ranked {
        println!("{score:.4}  {text}");
    }
    Ok(())
}
