//! Google Generative Language embedding client

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::http::HttpClient;
use crate::provider::{EmbeddingProvider, EmbeddingResult, check_vector};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Embedding provider backed by `embedContent` / `batchEmbedContents`
#[derive(Debug, Clone)]
pub struct GeminiEmbedProvider {
    client: HttpClient,
    base_url: String,
    /// Model id without the `models/` prefix
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl GeminiEmbedProvider {
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = HttpClient::new(
            "gemini",
            config.request_timeout(),
            &[(HeaderName::from_static(API_KEY_HEADER), api_key)],
        )?;

        let model = config
            .model_name()
            .trim_start_matches("models/")
            .to_string();

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            model,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    fn content_request<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: None,
            content: Content {
                parts: vec![Part { text }],
            },
            output_dimensionality: self.dimensions,
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let qualified = format!("models/{}", self.model);
        let requests = batch
            .iter()
            .map(|text| EmbedContentRequest {
                model: Some(&qualified),
                ..self.content_request(text)
            })
            .collect();

        let response: BatchEmbedResponse = self
            .client
            .post_json(
                &self.method_url("batchEmbedContents"),
                &BatchEmbedRequest { requests },
            )
            .await?;

        if response.embeddings.len() != batch.len() {
            return Err(EmbedError::malformed(format!(
                "gemini returned {} embeddings for {} inputs",
                response.embeddings.len(),
                batch.len()
            )));
        }

        let mut vectors = Vec::with_capacity(batch.len());
        for embedding in response.embeddings {
            check_vector("gemini", &embedding.values)?;
            vectors.push(embedding.values);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbedContentResponse = self
            .client
            .post_json(&self.method_url("embedContent"), &self.content_request(text))
            .await?;

        check_vector("gemini", &response.embedding.values)?;
        Ok(response.embedding.values)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!("Requesting {} gemini embeddings", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> GeminiEmbedProvider {
        let config = EmbedConfig::gemini(model)
            .with_api_key("test-key")
            .with_dimensions(768);
        GeminiEmbedProvider::new(&config).unwrap()
    }

    #[test]
    fn test_method_urls() {
        let provider = provider("models/gemini-embedding-001");
        assert_eq!(provider.model_name(), "gemini-embedding-001");
        assert_eq!(
            provider.method_url("embedContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent"
        );
    }

    #[test]
    fn test_single_request_shape() {
        let provider = provider("gemini-embedding-001");
        let json = serde_json::to_value(provider.content_request("leave policy")).unwrap();

        assert_eq!(json["content"]["parts"][0]["text"], "leave policy");
        assert_eq!(json["outputDimensionality"], 768);
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let single: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.25, -0.5]}}"#).unwrap();
        assert_eq!(single.embedding.values, vec![0.25, -0.5]);

        let batch: BatchEmbedResponse = serde_json::from_str(
            r#"{"embeddings": [{"values": [1.0]}, {"values": [2.0]}]}"#,
        )
        .unwrap();
        assert_eq!(batch.embeddings.len(), 2);
    }

    #[tokio::test]
    #[ignore] // Requires GOOGLE_API_KEY - run with: cargo test test_gemini_live -- --ignored
    async fn test_gemini_live() -> Result<()> {
        let provider = GeminiEmbedProvider::new(&EmbedConfig::default())?;
        let texts = vec!["Overtime needs approval.".to_string(), "Payday is the 25th.".to_string()];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 2);
        assert!(result.dimension > 0);
        Ok(())
    }
}
