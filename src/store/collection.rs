//! The vector collection: an embedding-backed document set
//!
//! The store consumes an abstract [`Collection`]; [`EmbeddedCollection`] is
//! the default persistent implementation. Documents and their embeddings live
//! in memory guarded by a readers-writer lock and are written back to disk
//! after each mutation. Similarity is exact cosine over the full set, scored
//! in parallel, mapped into `[0, 1]`.

use crate::embedding::Embedder;
use crate::error::{ConfigError, SourcererError, StoreError};
use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A document to insert; the collection embeds the content itself
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
}

/// A stored document with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub embedding: Vec<f32>,
}

/// One similarity-search result
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub similarity: f32,
}

/// Id and metadata only, for cheap full listings
#[derive(Debug, Clone)]
pub struct ShallowDocument {
    pub id: String,
    pub metadata: HashMap<String, String>,
}

/// Abstract vector collection consumed by the index store.
///
/// Metadata filters are conjunctive: a document matches when every key-value
/// pair matches exactly.
#[async_trait]
pub trait Collection: Send + Sync {
    async fn add_documents(
        &self,
        docs: Vec<NewDocument>,
        parallelism: usize,
    ) -> Result<(), SourcererError>;

    async fn delete(&self, where_meta: &HashMap<String, String>) -> Result<(), SourcererError>;

    async fn query(
        &self,
        text: &str,
        k: usize,
        where_meta: Option<&HashMap<String, String>>,
    ) -> Result<Vec<QueryHit>, SourcererError>;

    async fn query_embedding(
        &self,
        embedding: &[f32],
        k: usize,
        where_meta: Option<&HashMap<String, String>>,
    ) -> Result<Vec<QueryHit>, SourcererError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, SourcererError>;

    async fn list_shallow(&self) -> Result<Vec<ShallowDocument>, SourcererError>;

    async fn count(&self) -> usize;
}

/// Collection header persisted next to the documents; ties the index to one
/// embedding provider
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionMeta {
    fingerprint: String,
    dimension: usize,
}

/// Persistent embedded collection backed by JSON files under the db
/// directory.
pub struct EmbeddedCollection {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
    docs: RwLock<HashMap<String, Document>>,
}

impl std::fmt::Debug for EmbeddedCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedCollection")
            .field("dir", &self.dir)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl EmbeddedCollection {
    /// Open or create the collection at `dir`.
    ///
    /// A collection created under a different embedding provider refuses to
    /// open; the operator must delete the directory to rebuild.
    pub fn open(
        dir: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, SourcererError> {
        let dir = dir.as_ref().to_path_buf();
        let path_str = dir.display().to_string();

        std::fs::create_dir_all(&dir).map_err(|e| StoreError::OpenFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let meta_path = dir.join("meta.json");
        if meta_path.exists() {
            let raw = std::fs::read(&meta_path).map_err(|e| StoreError::OpenFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
            let meta: CollectionMeta =
                serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupted {
                    path: path_str.clone(),
                    reason: format!("meta.json: {e}"),
                })?;
            if meta.fingerprint != embedder.fingerprint() {
                return Err(ConfigError::ProviderMismatch {
                    db_path: path_str,
                    expected: meta.fingerprint,
                    actual: embedder.fingerprint(),
                }
                .into());
            }
        }

        let docs_path = dir.join("documents.json");
        let docs: HashMap<String, Document> = if docs_path.exists() {
            let raw = std::fs::read(&docs_path).map_err(|e| StoreError::OpenFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;
            serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupted {
                path: path_str.clone(),
                reason: format!("documents.json: {e}"),
            })?
        } else {
            HashMap::new()
        };

        let collection = Self {
            dir,
            embedder,
            dimension,
            docs: RwLock::new(docs),
        };
        collection.save_meta()?;
        Ok(collection)
    }

    fn path_str(&self) -> String {
        self.dir.display().to_string()
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let meta = CollectionMeta {
            fingerprint: self.embedder.fingerprint(),
            dimension: self.dimension,
        };
        let raw = serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::PersistFailed {
            path: self.path_str(),
            reason: e.to_string(),
        })?;
        std::fs::write(self.dir.join("meta.json"), raw).map_err(|e| StoreError::PersistFailed {
            path: self.path_str(),
            reason: e.to_string(),
        })
    }

    /// Write the document set back to disk; called under the write lock so
    /// the on-disk state always reflects a complete mutation
    fn save_docs(&self, docs: &HashMap<String, Document>) -> Result<(), String> {
        let raw = serde_json::to_vec(docs).map_err(|e| e.to_string())?;
        std::fs::write(self.dir.join("documents.json"), raw).map_err(|e| e.to_string())
    }

    fn matches(doc: &Document, where_meta: Option<&HashMap<String, String>>) -> bool {
        let Some(filter) = where_meta else {
            return true;
        };
        filter
            .iter()
            .all(|(k, v)| doc.metadata.get(k).is_some_and(|value| value == v))
    }

    fn rank(
        docs: &HashMap<String, Document>,
        embedding: &[f32],
        k: usize,
        where_meta: Option<&HashMap<String, String>>,
    ) -> Vec<QueryHit> {
        let mut hits: Vec<QueryHit> = docs
            .par_iter()
            .filter(|(_, doc)| Self::matches(doc, where_meta))
            .map(|(id, doc)| QueryHit {
                id: id.clone(),
                similarity: cosine_similarity(embedding, &doc.embedding),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }
}

#[async_trait]
impl Collection for EmbeddedCollection {
    async fn add_documents(
        &self,
        docs: Vec<NewDocument>,
        _parallelism: usize,
    ) -> Result<(), SourcererError> {
        if docs.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != docs.len() {
            return Err(crate::error::EmbedError::BatchShape {
                want: docs.len(),
                got: embeddings.len(),
            }
            .into());
        }
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(crate::error::EmbedError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                }
                .into());
            }
        }

        let mut guard = self.docs.write().await;
        for (doc, embedding) in docs.into_iter().zip(embeddings) {
            guard.insert(
                doc.id.clone(),
                Document {
                    id: doc.id,
                    content: doc.content,
                    metadata: doc.metadata,
                    embedding,
                },
            );
        }
        self.save_docs(&guard)
            .map_err(|reason| StoreError::AddFailed {
                path: self.path_str(),
                reason,
            })?;

        Ok(())
    }

    async fn delete(&self, where_meta: &HashMap<String, String>) -> Result<(), SourcererError> {
        let mut guard = self.docs.write().await;
        let before = guard.len();
        guard.retain(|_, doc| !Self::matches(doc, Some(where_meta)));
        if guard.len() != before {
            self.save_docs(&guard)
                .map_err(|reason| StoreError::DeleteFailed {
                    path: self.path_str(),
                    reason,
                })?;
        }
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        k: usize,
        where_meta: Option<&HashMap<String, String>>,
    ) -> Result<Vec<QueryHit>, SourcererError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let texts = [text.to_string()];
        let embeddings = self.embedder.embed(&texts).await?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::QueryFailed("no query embedding produced".to_string()))?;

        self.query_embedding(&embedding, k, where_meta).await
    }

    async fn query_embedding(
        &self,
        embedding: &[f32],
        k: usize,
        where_meta: Option<&HashMap<String, String>>,
    ) -> Result<Vec<QueryHit>, SourcererError> {
        let guard = self.docs.read().await;
        Ok(Self::rank(&guard, embedding, k, where_meta))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, SourcererError> {
        let guard = self.docs.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn list_shallow(&self) -> Result<Vec<ShallowDocument>, SourcererError> {
        let guard = self.docs.read().await;
        Ok(guard
            .values()
            .map(|doc| ShallowDocument {
                id: doc.id.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect())
    }

    async fn count(&self) -> usize {
        self.docs.read().await.len()
    }
}

/// Cosine similarity mapped into `[0, 1]`; orthogonal vectors score 0.5,
/// zero-norm vectors score 0
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cos = dot / (norm_a * norm_b);
    ((1.0 + cos) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;

    /// Maps each text onto a fixed 4-dim vector by keyword, so similarity is
    /// predictable without a model
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("auth") { 1.0 } else { 0.0 },
                        if t.contains("database") { 1.0 } else { 0.0 },
                        if t.contains("cache") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect())
        }

        fn fingerprint(&self) -> String {
            "test/keyword".to_string()
        }
    }

    fn doc(id: &str, content: &str, file: &str) -> NewDocument {
        let mut metadata = HashMap::new();
        metadata.insert("file".to_string(), file.to_string());
        NewDocument {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
        }
    }

    async fn open_collection(dir: &Path) -> EmbeddedCollection {
        EmbeddedCollection::open(dir, Arc::new(KeywordEmbedder), 4).unwrap()
    }

    #[tokio::test]
    async fn test_add_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let collection = open_collection(dir.path()).await;

        collection
            .add_documents(
                vec![
                    doc("a", "auth middleware", "a.go"),
                    doc("b", "database pool", "b.go"),
                ],
                1,
            )
            .await
            .unwrap();

        assert_eq!(collection.count().await, 2);

        let hits = collection.query("auth flow", 10, None).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[tokio::test]
    async fn test_delete_by_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let collection = open_collection(dir.path()).await;

        collection
            .add_documents(
                vec![
                    doc("a1", "auth", "a.go"),
                    doc("a2", "auth two", "a.go"),
                    doc("b1", "database", "b.go"),
                ],
                1,
            )
            .await
            .unwrap();

        let mut filter = HashMap::new();
        filter.insert("file".to_string(), "a.go".to_string());
        collection.delete(&filter).await.unwrap();

        assert_eq!(collection.count().await, 1);
        assert!(collection.get_by_id("a1").await.unwrap().is_none());
        assert!(collection.get_by_id("b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let collection = open_collection(dir.path()).await;
            collection
                .add_documents(vec![doc("a", "auth", "a.go")], 1)
                .await
                .unwrap();
        }

        let reopened = open_collection(dir.path()).await;
        assert_eq!(reopened.count().await, 1);
        let stored = reopened.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.content, "auth");
        assert_eq!(stored.embedding.len(), 4);
    }

    #[tokio::test]
    async fn test_provider_mismatch_refuses_open() {
        struct OtherEmbedder;

        #[async_trait]
        impl Embedder for OtherEmbedder {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
                Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
            }
            fn fingerprint(&self) -> String {
                "test/other".to_string()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        {
            open_collection(dir.path()).await;
        }

        let err = EmbeddedCollection::open(dir.path(), Arc::new(OtherEmbedder), 4).unwrap_err();
        assert!(matches!(
            err,
            SourcererError::Config(ConfigError::ProviderMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_excludes_nothing_by_itself() {
        let dir = tempfile::tempdir().unwrap();
        let collection = open_collection(dir.path()).await;
        collection
            .add_documents(vec![doc("a", "auth", "a.go")], 1)
            .await
            .unwrap();

        let stored = collection.get_by_id("a").await.unwrap().unwrap();
        let hits = collection
            .query_embedding(&stored.embedding, 10, None)
            .await
            .unwrap();
        // the source document itself ranks first; callers skip it
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn test_shallow_listing_has_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let collection = open_collection(dir.path()).await;
        collection
            .add_documents(vec![doc("a", "auth", "a.go")], 1)
            .await
            .unwrap();

        let shallow = collection.list_shallow().await.unwrap();
        assert_eq!(shallow.len(), 1);
        assert_eq!(shallow[0].metadata.get("file").unwrap(), "a.go");
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
