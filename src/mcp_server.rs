//! MCP protocol server exposing the semantic-navigation tool surface

use crate::analyzer::Analyzer;
use crate::config::Config;
use crate::types::*;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

const SERVER_INSTRUCTIONS: &str = "\
Sourcerer maintains a semantic index of this workspace: project memory \
(MEMORY.md, decisions.md - decisions, constraints, lessons that survive \
conversation resets), source code, documentation, and tests. Check memory \
FIRST before architectural decisions or significant changes: use \
search_memory, or semantic_search with file_types ['memory']. Use \
semantic_search to locate code by purpose, then get_chunk_code with the \
returned chunk IDs for surgical retrieval instead of reading whole files. \
Chunk IDs look like path/to/file.ext::Type::method for named entities and \
file.ext::<hash> for imports and markdown sections; if you already know the \
symbol and file, construct the ID yourself. Line numbers in results \
reference the original file. For exact-name lookups prefer grep-like tools; \
semantic search is for concepts and behavior.";

/// Stdio MCP server wrapping the analyzer
#[derive(Clone)]
pub struct SourcererServer {
    analyzer: Arc<Analyzer>,
    tool_router: ToolRouter<Self>,
}

impl SourcererServer {
    pub async fn new(config: Config) -> Result<Self> {
        let analyzer = Analyzer::new(config)
            .await
            .context("Failed to initialize analyzer")?;
        Ok(Self::with_analyzer(analyzer))
    }

    pub fn with_analyzer(analyzer: Arc<Analyzer>) -> Self {
        Self {
            analyzer,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn serve_stdio(config: Config) -> Result<()> {
        tracing::info!(workspace = %config.workspace_root.display(), "starting MCP server");

        let server = Self::new(config)
            .await
            .context("Failed to create MCP server")?;

        let transport = rmcp::transport::io::stdio();
        server.serve(transport).await?.waiting().await?;

        Ok(())
    }
}

#[tool_router(router = tool_router)]
impl SourcererServer {
    #[tool(description = "Find relevant code using semantic search")]
    async fn semantic_search(
        &self,
        Parameters(req): Parameters<SemanticSearchRequest>,
    ) -> Result<String, String> {
        let results = self
            .analyzer
            .semantic_search(&req.query, &req.file_types)
            .await
            .map_err(|e| format!("Search failed: {e}"))?;

        if results.is_empty() {
            return Ok("No matching chunks found.".to_string());
        }
        Ok(results.join("\n"))
    }

    #[tool(description = "Find code chunks semantically similar to a given chunk")]
    async fn find_similar_chunks(
        &self,
        Parameters(req): Parameters<FindSimilarChunksRequest>,
    ) -> Result<String, String> {
        let results = self
            .analyzer
            .find_similar_chunks(&req.id)
            .await
            .map_err(|e| format!("Search failed: {e}"))?;

        if results.is_empty() {
            return Ok("No similar chunks found.".to_string());
        }
        Ok(results.join("\n"))
    }

    #[tool(description = "Get the actual code you need to examine")]
    async fn get_chunk_code(
        &self,
        Parameters(req): Parameters<GetChunkCodeRequest>,
    ) -> Result<String, String> {
        if req.ids.is_empty() {
            return Err("at least one chunk id is required".to_string());
        }
        Ok(self.analyzer.get_chunk_code(&req.ids).await)
    }

    #[tool(description = "Index all pending files in the workspace")]
    async fn index_workspace(
        &self,
        Parameters(_req): Parameters<IndexWorkspaceRequest>,
    ) -> Result<String, String> {
        let analyzer = self.analyzer.clone();
        tokio::spawn(async move {
            analyzer.index_workspace().await;
        });

        Ok("Indexing in progress...".to_string())
    }

    #[tool(description = "Get the codebase's indexing status")]
    async fn get_index_status(
        &self,
        Parameters(_req): Parameters<GetIndexStatusRequest>,
    ) -> Result<String, String> {
        let (pending, last_indexed_at) = self.analyzer.status();

        let last = match last_indexed_at {
            Some(t) => relative_time(t, Utc::now()),
            None => "in progress".to_string(),
        };
        Ok(format!(
            "Number of pending files: {pending}, last indexed: {last}"
        ))
    }

    #[tool(
        description = "Search project memory for past decisions, design rationale, and documented context. Searches MEMORY.md and decisions.md files."
    )]
    async fn search_memory(
        &self,
        Parameters(req): Parameters<SearchMemoryRequest>,
    ) -> Result<String, String> {
        let results = self
            .analyzer
            .semantic_search(&req.query, &["memory".to_string()])
            .await
            .map_err(|e| format!("Memory search failed: {e}"))?;

        if results.is_empty() {
            return Ok("No matching decisions or context found in project memory.".to_string());
        }
        Ok(results.join("\n"))
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for SourcererServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sourcerer".into(),
                title: Some("Sourcerer - Semantic Code Navigation & Project Memory".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(SERVER_INSTRUCTIONS.into()),
        }
    }
}

/// Coarse relative-time phrase for status output
fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);

    let (count, unit) = if secs < 60 {
        (secs.max(1), "second")
    } else if secs < 3_600 {
        (secs / 60, "minute")
    } else if secs < 86_400 {
        (secs / 3_600, "hour")
    } else {
        (secs / 86_400, "day")
    };

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_relative_time_phrases() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "1 second ago");
        assert_eq!(
            relative_time(now - TimeDelta::seconds(42), now),
            "42 seconds ago"
        );
        assert_eq!(
            relative_time(now - TimeDelta::minutes(1), now),
            "1 minute ago"
        );
        assert_eq!(
            relative_time(now - TimeDelta::minutes(30), now),
            "30 minutes ago"
        );
        assert_eq!(relative_time(now - TimeDelta::hours(5), now), "5 hours ago");
        assert_eq!(relative_time(now - TimeDelta::days(2), now), "2 days ago");
    }
}
