//! Local embedding endpoint provider (Ollama-compatible API)

use super::Embedder;
use crate::error::EmbedError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for a local embedding endpoint.
///
/// The endpoint embeds one prompt per request, so a batch fans out into
/// concurrent requests bounded by the core count. `buffered` keeps results
/// in input order.
pub struct LocalEmbedder {
    client: reqwest::Client,
    url: String,
    endpoint: String,
    model: String,
    timeout_secs: u64,
    parallelism: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl LocalEmbedder {
    pub fn new(endpoint: String, model: String, timeout: Duration) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Network(e.to_string()))?;

        let url = format!("{}/embeddings", endpoint.trim_end_matches('/'));
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(Self {
            client,
            url,
            endpoint,
            model,
            timeout_secs: timeout.as_secs(),
            parallelism,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedError::Timeout(self.timeout_secs)
                } else {
                    EmbedError::Network(format!("{} ({})", e, self.url))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(300).collect();
            return Err(EmbedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Network(format!("invalid embedding response: {e}")))?;

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let futures: Vec<_> = texts
            .iter()
            .map(|text| Box::pin(self.embed_one(text)))
            .collect();
        let results: Vec<Result<Vec<f32>, EmbedError>> = stream::iter(futures)
            .buffered(self.parallelism)
            .collect()
            .await;

        results.into_iter().collect()
    }

    fn fingerprint(&self) -> String {
        format!("local/{}/{}", self.endpoint, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let embedder = LocalEmbedder::new(
            "http://localhost:11434/api/".to_string(),
            "nomic-embed-text".to_string(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(embedder.url, "http://localhost:11434/api/embeddings");
    }

    #[test]
    fn test_fingerprint_includes_endpoint_and_model() {
        let embedder = LocalEmbedder::new(
            "http://localhost:11434/api".to_string(),
            "nomic-embed-text".to_string(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(
            embedder.fingerprint(),
            "local/http://localhost:11434/api/nomic-embed-text"
        );
    }
}
