use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request for semantic search over the index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SemanticSearchRequest {
    /// Your search, phrased by purpose or behavior rather than exact names
    pub query: String,
    /// Filter by file type(s): memory, src, docs, tests. Defaults to src and
    /// docs when omitted.
    #[serde(default)]
    pub file_types: Vec<String>,
}

/// Request for chunks similar to an existing chunk
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FindSimilarChunksRequest {
    /// The chunk ID to find similar code for
    pub id: String,
}

/// Request for raw chunk sources
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetChunkCodeRequest {
    /// Chunks to get code for, e.g. `src/a.go::Bar::Baz`
    pub ids: Vec<String>,
}

/// Request to kick off a workspace indexing pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IndexWorkspaceRequest {}

/// Request for the current indexing status
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetIndexStatusRequest {}

/// Request to search project memory
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchMemoryRequest {
    /// What decision, rationale, or context to find (e.g. "authentication
    /// approach", "why we chose this database")
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults_file_types() {
        let req: SemanticSearchRequest =
            serde_json::from_str(r#"{"query": "auth"}"#).unwrap();
        assert_eq!(req.query, "auth");
        assert!(req.file_types.is_empty());
    }

    #[test]
    fn test_get_chunk_code_request_parses_ids() {
        let req: GetChunkCodeRequest =
            serde_json::from_str(r#"{"ids": ["a.go::Foo", "b.md::Intro"]}"#).unwrap();
        assert_eq!(req.ids.len(), 2);
    }
}
