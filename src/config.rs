/// Configuration system for sourcerer
///
/// Loaded once at startup from environment variables layered over defaults.
/// The embedding provider choice is made here and nowhere else; the store
/// receives it as an explicit value at construction.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the remote provider API key
pub const ENV_PROVIDER_KEY: &str = "EMBEDDING_PROVIDER_KEY";
/// Environment variable overriding the local embedding endpoint
pub const ENV_LOCAL_ENDPOINT: &str = "LOCAL_EMBED_ENDPOINT";
/// Environment variable overriding the local embedding model
pub const ENV_LOCAL_MODEL: &str = "LOCAL_EMBED_MODEL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Absolute path to the workspace root being indexed
    pub workspace_root: PathBuf,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Workspace walking and worker-pool configuration
    pub indexing: IndexingConfig,

    /// Search thresholds
    pub search: SearchConfig,
}

/// Which embedding backend to use; decided once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote HTTP provider authenticated by API key
    Remote { api_key: String, model: String },
    /// Local embedding endpoint (Ollama-compatible API)
    Local { endpoint: String, model: String },
}

impl EmbeddingProvider {
    /// Stable identity string persisted with the collection; changing it
    /// invalidates the index
    pub fn fingerprint(&self) -> String {
        match self {
            EmbeddingProvider::Remote { model, .. } => format!("remote/{model}"),
            EmbeddingProvider::Local { endpoint, model } => format!("local/{endpoint}/{model}"),
        }
    }
}

/// Embedding request behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum attempts per batch (initial call plus retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Base backoff delay in milliseconds, doubled per attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

/// Workspace walking and worker-pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// File extensions eligible for indexing (with leading dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Directory basenames never descended into
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Upper bound on concurrent parse+embed workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Seconds between maintenance passes
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval_secs: u64,

    /// Soft per-file processing timeout in seconds
    #[serde(default = "default_file_timeout")]
    pub file_timeout_secs: u64,
}

/// Search thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum similarity for a search hit
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Maximum number of search results
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    5
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_cap_ms() -> u64 {
    8_000
}

fn default_allowed_extensions() -> Vec<String> {
    [".go", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".py", ".md", ".markdown"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_excluded_dirs() -> Vec<String> {
    [".git", "node_modules", ".sourcerer", "vendor", "target", "dist", "build"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.min(8)
}

fn default_rescan_interval() -> u64 {
    60
}

fn default_file_timeout() -> u64 {
    60
}

fn default_min_similarity() -> f32 {
    0.3
}

fn default_max_results() -> usize {
    30
}

fn default_local_endpoint() -> String {
    "http://localhost:11434/api".to_string()
}

fn default_local_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_remote_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Config {
    /// Build configuration for a workspace from the environment.
    ///
    /// Provider precedence: the remote key wins when present, otherwise the
    /// local endpoint (with its defaults) is used.
    pub fn from_env(workspace_root: impl AsRef<Path>) -> Self {
        let provider = match std::env::var(ENV_PROVIDER_KEY) {
            Ok(key) if !key.trim().is_empty() => EmbeddingProvider::Remote {
                api_key: key,
                model: default_remote_model(),
            },
            _ => {
                let endpoint = std::env::var(ENV_LOCAL_ENDPOINT)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(default_local_endpoint);
                let model = std::env::var(ENV_LOCAL_MODEL)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(default_local_model);
                EmbeddingProvider::Local { endpoint, model }
            }
        };

        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            embedding: EmbeddingConfig {
                provider,
                request_timeout_secs: default_request_timeout(),
                max_attempts: default_max_attempts(),
                backoff_base_ms: default_backoff_base_ms(),
                backoff_cap_ms: default_backoff_cap_ms(),
            },
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
        }
    }

    /// Directory holding the persisted vector collection
    pub fn db_path(&self) -> PathBuf {
        self.workspace_root.join(".sourcerer").join("db")
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            excluded_dirs: default_excluded_dirs(),
            max_workers: default_max_workers(),
            rescan_interval_secs: default_rescan_interval(),
            file_timeout_secs: default_file_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            max_results: default_max_results(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_cap() {
        assert!(default_max_workers() >= 1);
        assert!(default_max_workers() <= 8);
    }

    #[test]
    fn test_db_path_under_workspace() {
        let config = Config::from_env("/tmp/ws");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/ws/.sourcerer/db"));
    }

    #[test]
    fn test_provider_fingerprint() {
        let remote = EmbeddingProvider::Remote {
            api_key: "sk-abc".to_string(),
            model: "text-embedding-3-small".to_string(),
        };
        assert_eq!(remote.fingerprint(), "remote/text-embedding-3-small");

        let local = EmbeddingProvider::Local {
            endpoint: "http://localhost:11434/api".to_string(),
            model: "nomic-embed-text".to_string(),
        };
        assert!(local.fingerprint().starts_with("local/"));
        assert!(local.fingerprint().ends_with("nomic-embed-text"));
    }

    #[test]
    fn test_fingerprint_omits_api_key() {
        let remote = EmbeddingProvider::Remote {
            api_key: "sk-secret".to_string(),
            model: "text-embedding-3-small".to_string(),
        };
        assert!(!remote.fingerprint().contains("sk-secret"));
    }

    #[test]
    fn test_default_extension_allow_list() {
        let exts = default_allowed_extensions();
        for ext in [".go", ".py", ".md", ".tsx"] {
            assert!(exts.iter().any(|e| e == ext), "missing {ext}");
        }
    }
}
