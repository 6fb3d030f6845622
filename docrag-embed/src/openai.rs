//! OpenAI-compatible `/embeddings` client

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::http::HttpClient;
use crate::provider::{EmbeddingProvider, EmbeddingResult, check_vector};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

/// Embedding provider for OpenAI and servers that mimic its API
#[derive(Debug, Clone)]
pub struct OpenAiEmbedProvider {
    client: HttpClient,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAiEmbedProvider {
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = HttpClient::new(
            "openai",
            config.request_timeout(),
            &[(AUTHORIZATION, format!("Bearer {api_key}"))],
        )?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url()),
            model: config.model_name().to_string(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
            dimensions: self.dimensions,
        };
        let response: EmbeddingResponse = self.client.post_json(&self.endpoint, &request).await?;

        if response.data.len() != batch.len() {
            return Err(EmbedError::malformed(format!(
                "openai returned {} embeddings for {} inputs",
                response.data.len(),
                batch.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            check_vector("openai", &item.embedding)?;
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        self.embed_batch(&batch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("openai returned no embedding"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!("Requesting {} openai embeddings", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let input = vec!["hello".to_string()];
        let request = EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"][0], "hello");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.3, 0.4]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let mut response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        response.data.sort_by_key(|item| item.index);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = EmbedConfig::openai("text-embedding-3-small")
            .with_api_key("sk-test")
            .with_base_url("http://localhost:9999/v1/");
        let provider = OpenAiEmbedProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:9999/v1/embeddings");
        assert_eq!(provider.model_name(), "text-embedding-3-small");
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY - run with: cargo test test_openai_live -- --ignored
    async fn test_openai_live() -> Result<()> {
        let provider = OpenAiEmbedProvider::new(&EmbedConfig::openai("text-embedding-3-small"))?;
        let vector = provider.embed_text("Annual leave is fifteen days.").await?;
        assert_eq!(vector.len(), 1536);
        Ok(())
    }
}
