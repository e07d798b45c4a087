/// Centralized error types for sourcerer using thiserror
///
/// Domain-specific error kinds with user-facing messages. Parse and embed
/// failures on a single file are logged and swallowed by the orchestrator;
/// store and config failures surface to the caller.
use thiserror::Error;

/// Main error type for the indexing service
#[derive(Error, Debug)]
pub enum SourcererError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("chunk not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised at startup from invalid or conflicting configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "no usable embedding provider: {detail}\n\
         Set EMBEDDING_PROVIDER_KEY to use the remote provider, or ensure the \
         local endpoint is reachable (LOCAL_EMBED_ENDPOINT, LOCAL_EMBED_MODEL)"
    )]
    EmbeddingUnavailable { detail: String },

    #[error(
        "index at '{db_path}' was built with embeddings from '{expected}' but the \
         current configuration selects '{actual}'; delete the index directory to rebuild"
    )]
    ProviderMismatch {
        db_path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Errors from the persistent vector collection
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open vector store at '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("failed to add documents to vector store at '{path}': {reason}")]
    AddFailed { path: String, reason: String },

    #[error("failed to remove documents from vector store at '{path}': {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("failed to perform similarity search: {0}")]
    QueryFailed(String),

    #[error("failed to persist vector store at '{path}': {reason}")]
    PersistFailed { path: String, reason: String },

    #[error("vector store at '{path}' is corrupted: {reason}")]
    Corrupted { path: String, reason: String },
}

/// Errors from parsing a single file; never fatal to a workspace pass
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to load grammar for {language}: {reason}")]
    Grammar { language: String, reason: String },

    #[error("failed to read '{file}': {reason}")]
    ReadFailed { file: String, reason: String },
}

/// Errors from the embedding backend
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Network(String),

    #[error("embedding backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("embedding request timed out after {0} seconds")]
    Timeout(u64),

    #[error("embedding failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: usize, last: String },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding batch returned {got} vectors for {want} texts")]
    BatchShape { want: usize, got: usize },

    #[error("embedding cancelled")]
    Cancelled,
}

impl EmbedError {
    /// Transient failures worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbedError::Network(_) | EmbedError::Timeout(_) => true,
            EmbedError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for SourcererError {
    fn from(err: anyhow::Error) -> Self {
        SourcererError::Other(format!("{:#}", err))
    }
}

impl SourcererError {
    pub fn other(msg: impl Into<String>) -> Self {
        SourcererError::Other(msg.into())
    }

    /// True for errors a maintenance pass swallows into logs rather than aborts on
    pub fn is_per_file(&self) -> bool {
        matches!(self, SourcererError::Parse(_) | SourcererError::Embed(_))
    }
}
