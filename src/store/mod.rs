//! Index store: chunks in, similarity queries out
//!
//! Wraps the vector collection with chunk metadata mapping, a freshness cache
//! keyed by file path, role-filtered search, and cleanup of files that
//! disappeared from the workspace.

mod collection;

pub use collection::{
    Collection, Document, EmbeddedCollection, NewDocument, QueryHit, ShallowDocument,
};

use crate::config::Config;
use crate::embedding::{Embedder, RetryingEmbedder};
use crate::error::SourcererError;
use crate::parser::{Chunk, ParsedFile};
use crate::workspace::FileRole;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Semantic-search and retrieval surface over the persisted collection.
///
/// The freshness cache maps each file path to the `parsed_at` watermark of
/// its chunks; it is rebuilt from a shallow listing at startup and mutated
/// briefly at the end of `index_file`/`remove`.
pub struct IndexStore {
    workspace_root: PathBuf,
    collection: Arc<dyn Collection>,
    cache: RwLock<HashMap<String, i64>>,
    min_similarity: f32,
    max_results: usize,
}

impl IndexStore {
    /// Open the store with the configured embedding provider.
    ///
    /// This is the single authoritative initialization: provider selection,
    /// a fail-fast reachability probe, collection open, and the freshness
    /// cache rebuild all happen here, before any caller can observe the
    /// store.
    pub async fn open(config: &Config, cancel: CancellationToken) -> Result<Self, SourcererError> {
        let embedder = crate::embedding::select(&config.embedding)?;
        let embedder: Arc<dyn Embedder> = Arc::new(RetryingEmbedder::new(
            embedder,
            &config.embedding,
            cancel,
        ));
        Self::open_with_embedder(config, embedder).await
    }

    /// Open the store with an externally constructed embedder. Used by tests
    /// and by callers that manage provider selection themselves.
    pub async fn open_with_embedder(
        config: &Config,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, SourcererError> {
        let dimension = crate::embedding::verify(embedder.as_ref()).await?;
        let collection = EmbeddedCollection::open(config.db_path(), embedder, dimension)?;

        let store = Self {
            workspace_root: config.workspace_root.clone(),
            collection: Arc::new(collection),
            cache: RwLock::new(HashMap::new()),
            min_similarity: config.search.min_similarity,
            max_results: config.search.max_results,
        };
        store.rebuild_cache().await?;
        Ok(store)
    }

    /// Rebuild the freshness cache from the persisted collection, taking the
    /// maximum `parsed_at` across each file's chunks
    async fn rebuild_cache(&self) -> Result<(), SourcererError> {
        let shallow = self.collection.list_shallow().await?;

        let mut watermarks: HashMap<String, i64> = HashMap::new();
        for doc in shallow {
            let Some(file) = doc.metadata.get("file") else {
                continue;
            };
            let Some(parsed_at) = doc.metadata.get("parsedAt").and_then(|v| v.parse().ok())
            else {
                continue;
            };
            let entry = watermarks.entry(file.clone()).or_insert(parsed_at);
            *entry = (*entry).max(parsed_at);
        }

        tracing::debug!(files = watermarks.len(), "freshness cache rebuilt");
        *self.cache.write().await = watermarks;
        Ok(())
    }

    /// Replace every chunk of a file with the newly parsed set.
    ///
    /// Removal strictly precedes the add; a concurrent search sees the old
    /// set or the new set for this file, never a mix of both. The caller
    /// serializes writers per path.
    pub async fn index_file(&self, file: &ParsedFile) -> Result<(), SourcererError> {
        self.remove(&file.path).await?;

        if file.chunks.is_empty() {
            return Ok(());
        }

        let docs: Vec<NewDocument> = file.chunks.iter().map(chunk_to_document).collect();
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.collection.add_documents(docs, parallelism).await?;

        let watermark = file.chunks[0].parsed_at;
        self.cache.write().await.insert(file.path.clone(), watermark);

        Ok(())
    }

    /// Delete every chunk whose `file` metadata equals `rel_path` and evict
    /// the path from the freshness cache
    pub async fn remove(&self, rel_path: &str) -> Result<(), SourcererError> {
        let mut filter = HashMap::new();
        filter.insert("file".to_string(), rel_path.to_string());
        self.collection.delete(&filter).await?;

        self.cache.write().await.remove(rel_path);
        Ok(())
    }

    /// Role-filtered semantic search.
    ///
    /// The collection only supports conjunctive filters, so the store
    /// over-fetches `|roles| x max_results` candidates and filters roles in
    /// memory. Results are similarity-descending, trimmed to the threshold
    /// and cap.
    pub async fn search(
        &self,
        query: &str,
        roles: &[FileRole],
    ) -> Result<Vec<String>, SourcererError> {
        let roles: HashSet<FileRole> = if roles.is_empty() {
            [FileRole::Src, FileRole::Docs].into_iter().collect()
        } else {
            roles.iter().copied().collect()
        };

        let total = self.collection.count().await;
        if total == 0 {
            return Ok(Vec::new());
        }
        let k = (roles.len() * self.max_results).min(total);

        let hits = self.collection.query(query, k, None).await?;
        self.format_hits(hits, self.min_similarity, self.max_results, None, Some(&roles))
            .await
    }

    /// Chunks semantically similar to an existing chunk, by its stored
    /// embedding; the source chunk itself is excluded
    pub async fn find_similar(&self, id: &str) -> Result<Vec<String>, SourcererError> {
        let doc = self
            .collection
            .get_by_id(id)
            .await?
            .ok_or_else(|| SourcererError::NotFound(id.to_string()))?;

        let hits = self
            .collection
            .query_embedding(&doc.embedding, 10, None)
            .await?;
        self.format_hits(hits, 2.0 * self.min_similarity, 10, Some(id), None)
            .await
    }

    async fn format_hits(
        &self,
        mut hits: Vec<QueryHit>,
        min_similarity: f32,
        max_count: usize,
        skip_id: Option<&str>,
        roles: Option<&HashSet<FileRole>>,
    ) -> Result<Vec<String>, SourcererError> {
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut formatted = Vec::new();
        for hit in hits {
            if skip_id.is_some_and(|skip| skip == hit.id) {
                continue;
            }
            if hit.similarity < min_similarity || formatted.len() >= max_count {
                break;
            }

            let Ok(chunk) = self.get_by_id(&hit.id).await else {
                continue;
            };
            if roles.is_some_and(|allowed| !allowed.contains(&chunk.role)) {
                continue;
            }

            formatted.push(format!(
                "{} | {} [{}]",
                hit.id,
                chunk.summary,
                chunk.line_range()
            ));
        }

        Ok(formatted)
    }

    /// Fetch one chunk by id
    pub async fn get_by_id(&self, id: &str) -> Result<Chunk, SourcererError> {
        let doc = self
            .collection
            .get_by_id(id)
            .await?
            .ok_or_else(|| SourcererError::NotFound(id.to_string()))?;
        Ok(document_to_chunk(doc))
    }

    /// A file is stale when its mtime is newer than the cached watermark or
    /// the path is unknown. Stat failures count as stale so the next pass
    /// retries the file.
    pub async fn is_stale(&self, rel_path: &str) -> bool {
        let mtime = match std::fs::metadata(self.workspace_root.join(rel_path)) {
            Ok(meta) => match meta.modified() {
                Ok(t) => t
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(i64::MAX),
                Err(_) => return true,
            },
            Err(_) => return true,
        };

        let cache = self.cache.read().await;
        match cache.get(rel_path) {
            Some(parsed_at) => mtime > *parsed_at,
            None => true,
        }
    }

    /// Drop index entries for files that no longer exist on disk
    pub async fn cleanup_missing(&self) {
        let tracked: Vec<String> = self.cache.read().await.keys().cloned().collect();

        for rel_path in tracked {
            if self.workspace_root.join(&rel_path).exists() {
                continue;
            }
            tracing::info!(file = %rel_path, "removing deleted file from index");
            if let Err(e) = self.remove(&rel_path).await {
                tracing::warn!(file = %rel_path, error = %e, "failed to remove deleted file");
            }
        }
    }

    /// Paths currently tracked by the freshness cache
    pub async fn tracked_files(&self) -> Vec<String> {
        self.cache.read().await.keys().cloned().collect()
    }
}

fn chunk_to_document(chunk: &Chunk) -> NewDocument {
    let mut metadata = HashMap::new();
    metadata.insert("file".to_string(), chunk.file.clone());
    metadata.insert("type".to_string(), chunk.role.as_str().to_string());
    metadata.insert("path".to_string(), chunk.path.clone());
    metadata.insert("summary".to_string(), chunk.summary.clone());
    metadata.insert("startLine".to_string(), chunk.start_line.to_string());
    metadata.insert("startColumn".to_string(), chunk.start_column.to_string());
    metadata.insert("endLine".to_string(), chunk.end_line.to_string());
    metadata.insert("endColumn".to_string(), chunk.end_column.to_string());
    metadata.insert("parsedAt".to_string(), chunk.parsed_at.to_string());

    NewDocument {
        id: chunk.id.clone(),
        content: chunk.source.clone(),
        metadata,
    }
}

fn document_to_chunk(doc: Document) -> Chunk {
    let get = |key: &str| doc.metadata.get(key).cloned().unwrap_or_default();
    let get_u32 = |key: &str| {
        doc.metadata
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    Chunk {
        file: get("file"),
        role: FileRole::parse(&get("type")).unwrap_or(FileRole::Src),
        path: get("path"),
        summary: get("summary"),
        source: doc.content,
        start_line: get_u32("startLine"),
        start_column: get_u32("startColumn"),
        end_line: get_u32("endLine"),
        end_column: get_u32("endColumn"),
        parsed_at: doc
            .metadata
            .get("parsedAt")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        id: doc.id,
    }
}
