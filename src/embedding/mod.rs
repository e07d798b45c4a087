//! Embedding providers and selection
//!
//! Both providers share one contract: a batch of texts in, a batch of
//! equal-length vectors out, same dimensionality for the lifetime of a
//! collection. The provider is chosen once at startup from configuration and
//! persisted with the collection; switching providers requires a rebuild.

mod local;
mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{ConfigError, EmbedError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Uniform "texts in, vectors out" contract
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Stable identity persisted with the collection
    fn fingerprint(&self) -> String;
}

/// Build the configured provider.
///
/// The remote provider is chosen when an API key is configured, otherwise the
/// local endpoint. Reachability is checked separately by [`verify`] so the
/// failure message can name both options.
pub fn select(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    match &config.provider {
        EmbeddingProvider::Remote { api_key, model } => {
            let embedder = RemoteEmbedder::new(api_key.clone(), model.clone(), timeout)
                .map_err(|e| ConfigError::EmbeddingUnavailable {
                    detail: e.to_string(),
                })?;
            Ok(Arc::new(embedder))
        }
        EmbeddingProvider::Local { endpoint, model } => {
            let embedder = LocalEmbedder::new(endpoint.clone(), model.clone(), timeout)
                .map_err(|e| ConfigError::EmbeddingUnavailable {
                    detail: e.to_string(),
                })?;
            Ok(Arc::new(embedder))
        }
    }
}

/// Fail fast at startup: embed one probe text and report the dimension.
pub async fn verify(embedder: &dyn Embedder) -> Result<usize, ConfigError> {
    let probe = ["sourcerer startup probe".to_string()];
    let vectors = embedder
        .embed(&probe)
        .await
        .map_err(|e| ConfigError::EmbeddingUnavailable {
            detail: e.to_string(),
        })?;

    vectors
        .first()
        .map(|v| v.len())
        .filter(|d| *d > 0)
        .ok_or_else(|| ConfigError::EmbeddingUnavailable {
            detail: "provider returned an empty vector".to_string(),
        })
}

/// Wraps a provider with exponential backoff on transient failures.
///
/// Backoff base 250 ms doubling per attempt, capped at 8 s, at most five
/// attempts; the loop aborts at the next retry boundary when cancelled.
pub struct RetryingEmbedder {
    inner: Arc<dyn Embedder>,
    max_attempts: usize,
    backoff_base: Duration,
    backoff_cap: Duration,
    cancel: CancellationToken,
}

impl RetryingEmbedder {
    pub fn new(
        inner: Arc<dyn Embedder>,
        config: &EmbeddingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
            cancel,
        }
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32 << (attempt.min(16) as u32);
        (self.backoff_base * factor).min(self.backoff_cap)
    }
}

#[async_trait]
impl Embedder for RetryingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut last = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff_for(attempt - 1);
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(EmbedError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                return Err(EmbedError::Cancelled);
            }

            match self.inner.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "embedding attempt failed");
                    last = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(EmbedError::ExhaustedRetries {
            attempts: self.max_attempts,
            last,
        })
    }

    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }
}
