//! OpenAI-compatible embeddings client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use ragflow_core::{Embedder, Error, Result};

use crate::client::{body_error, request_error};
use crate::config::EmbedderConfig;

/// Embeddings client for any server exposing `/v1/embeddings`
pub struct OpenAiEmbedder {
    config: EmbedderConfig,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Create a new embedder from configuration
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn request_embeddings(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = input.len();
        let request_body = EmbeddingRequest {
            model: &self.config.model_name,
            input,
        };

        let response = self
            .client
            .post(self.config.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Embedding(format!(
                "Embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(body_error)?;

        self.finish(body, expected)
    }

    /// Order, validate and normalise a raw response
    fn finish(&self, mut body: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
        if body.data.len() != expected {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                body.data.len()
            )));
        }

        body.data.sort_by_key(|d| d.index);

        body.data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.config.dimension {
                    return Err(Error::Embedding(format!(
                        "Embedding size {} does not match configured size {}",
                        d.embedding.len(),
                        self.config.dimension
                    )));
                }
                let mut vector = d.embedding;
                if self.config.normalize {
                    l2_normalize(&mut vector);
                }
                Ok(vector)
            })
            .collect()
    }

    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        match timeout(self.config.timeout, self.request_embeddings(input)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("Embedding request timed out".to_string())),
        }
    }
}

/// Scale a vector to unit length in place; zero vectors are left untouched
pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input = texts
            .iter()
            .map(|t| format!("{}{}", self.config.passage_prefix, t))
            .collect();
        self.embed(input).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![format!("{}{}", self.config.query_prefix, text)];
        self.embed(input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(dimension: usize, normalize: bool) -> OpenAiEmbedder {
        let mut config = EmbedderConfig::new("e5", "http://127.0.0.1:8080", dimension);
        config.normalize = normalize;
        OpenAiEmbedder::new(config).unwrap()
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_finish_orders_by_index() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"index": 1, "embedding": [0.0, 2.0]},
                {"index": 0, "embedding": [2.0, 0.0]}
            ]}"#,
        )
        .unwrap();

        let vectors = embedder(2, true).finish(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_finish_rejects_wrong_dimension() {
        let raw = r#"{"data": [{"index": 0, "embedding": [1.0, 2.0, 3.0]}]}"#;
        let body: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        let err = embedder(2, false).finish(body, 1).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_finish_rejects_missing_vectors() {
        let body: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(embedder(2, false).finish(body, 1).is_err());
    }

    #[tokio::test]
    async fn test_embed_documents_empty_input() {
        let vectors = embedder(2, true).embed_documents(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
