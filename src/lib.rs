//! # Sourcerer - Semantic Code Navigation and Project Memory
//!
//! An MCP server that maintains a semantic index over a developer workspace.
//! It watches a source tree, parses files into structured chunks (functions,
//! types, methods, markdown sections, memory entries), embeds each chunk into
//! a vector space, and serves similarity queries filtered by file role.
//!
//! ## Overview
//!
//! Files are classified by role (`memory`, `docs`, `src`, `tests`), chunked
//! into stable addressable units with persistent identifiers, and stored in
//! an embedding-backed collection under `.sourcerer/db`. A freshness cache
//! skips unchanged files; a maintenance loop reconciles the index with the
//! workspace every minute. Project memory files (MEMORY.md, decisions.md)
//! keep their role anywhere in the tree, which is how an assistant recovers
//! institutional knowledge after a context reset.
//!
//! ## Library Usage Example
//!
//! ```no_run
//! use sourcerer::{Analyzer, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env("/path/to/workspace");
//!     let analyzer = Analyzer::new(config).await?;
//!
//!     analyzer.index_workspace().await;
//!
//!     let hits = analyzer
//!         .semantic_search("authentication approach", &["memory".to_string()])
//!         .await?;
//!     for hit in hits {
//!         println!("{hit}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## MCP Server Usage Example
//!
//! ```no_run
//! use sourcerer::{Config, mcp_server::SourcererServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env(std::env::current_dir()?);
//!     SourcererServer::serve_stdio(config).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`workspace`]: file walking and role classification
//! - [`parser`]: structural (tree-sitter) and sectional (markdown) chunking
//! - [`embedding`]: embedding providers (remote key or local endpoint)
//! - [`store`]: the persistent vector collection and the index store
//! - [`analyzer`]: orchestration, worker pool, maintenance loop
//! - [`mcp_server`]: the stdio tool surface
//! - [`config`]: environment-driven configuration
//! - [`error`]: error types

/// Orchestration of walking, parsing, embedding, and storing
pub mod analyzer;

/// Environment-driven configuration
pub mod config;

/// Embedding providers and selection
pub mod embedding;

/// Error types and utilities
pub mod error;

/// MCP protocol server implementation
pub mod mcp_server;

/// Parsers producing addressable chunks
pub mod parser;

/// Index store over the persistent vector collection
pub mod store;

/// Tool request types
pub mod types;

/// Workspace walking and file-role classification
pub mod workspace;

pub use analyzer::Analyzer;
pub use config::Config;
pub use error::SourcererError;
pub use parser::{Chunk, ParsedFile};
pub use store::IndexStore;
pub use workspace::FileRole;
