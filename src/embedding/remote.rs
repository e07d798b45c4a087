//! Remote embedding provider (API-key authenticated HTTP endpoint)

use super::Embedder;
use crate::error::EmbedError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REMOTE_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

/// Batch embedding client for the remote provider.
///
/// Sends the whole batch in one request; the backend guarantees one vector
/// per input in input order (the `index` field is used to restore order
/// defensively).
pub struct RemoteEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> EmbedError {
        if e.is_timeout() {
            EmbedError::Timeout(self.timeout_secs)
        } else {
            EmbedError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(REMOTE_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.chars().take(300).collect();
            return Err(EmbedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Network(format!("invalid embeddings response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::BatchShape {
                want: texts.len(),
                got: parsed.data.len(),
            });
        }

        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }

    fn fingerprint(&self) -> String {
        format!("remote/{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint() {
        let embedder = RemoteEmbedder::new(
            "sk-test".to_string(),
            "text-embedding-3-small".to_string(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(embedder.fingerprint(), "remote/text-embedding-3-small");
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let embedder = RemoteEmbedder::new(
            "sk-test".to_string(),
            "text-embedding-3-small".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        // no texts means no network call at all
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
