//! End-to-end indexing scenarios over a temp workspace
//!
//! A deterministic token-bucket embedder stands in for the real providers so
//! similarity behaves predictably without a model or network.

use async_trait::async_trait;
use sourcerer::analyzer::Analyzer;
use sourcerer::config::Config;
use sourcerer::embedding::Embedder;
use sourcerer::error::{EmbedError, SourcererError};
use sourcerer::store::IndexStore;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DIM: usize = 64;

/// Hashes each token into a fixed bucket; texts sharing words get similar
/// vectors
struct TokenEmbedder;

#[async_trait]
impl Embedder for TokenEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIM];
                let tokens = text
                    .to_lowercase()
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                for token in tokens {
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn fingerprint(&self) -> String {
        "test/token-bucket".to_string()
    }
}

async fn build_analyzer(ws: &Path) -> Arc<Analyzer> {
    let config = Config::from_env(ws);
    let store = IndexStore::open_with_embedder(&config, Arc::new(TokenEmbedder))
        .await
        .expect("store should open");
    Analyzer::with_parts(config, Arc::new(store), CancellationToken::new())
}

fn write(ws: &Path, rel: &str, content: &str) {
    let path = ws.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn memory_section_is_searchable_by_id_and_summary() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        "MEMORY.md",
        "## Authentication\n\nWe decided on JWT with refresh tokens.\n",
    );

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    let results = analyzer
        .semantic_search("authentication approach", &["memory".to_string()])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let entry = &results[0];
    assert!(entry.starts_with("MEMORY.md::Authentication | "));
    let summary = entry.split(" | ").nth(1).unwrap();
    assert!(summary.starts_with("section "));
    assert!(entry.ends_with("[lines 1-3]"));
}

#[tokio::test]
async fn source_entities_are_retrievable_and_ranked() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        "src/a.go",
        r#"package main

func Foo() string {
	return "foo"
}

type Bar struct {
	n int
}

func (b *Bar) Baz() int {
	return b.n
}
"#,
    );

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    let method = analyzer.store().get_by_id("src/a.go::Bar::Baz").await.unwrap();
    assert!(method.source.contains("func (b *Bar) Baz()"));
    assert_eq!(method.summary, "method `Bar::Baz`");

    let results = analyzer
        .semantic_search("foo", &["src".to_string()])
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(
        results[0].starts_with("src/a.go::Foo | "),
        "expected Foo first, got {:?}",
        results
    );
}

#[tokio::test]
async fn memory_files_keep_their_role_under_docs() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        "docs/MEMORY.md",
        "## Database Choice\n\nPostgres over SQLite for concurrency.\n",
    );
    write(ws.path(), "docs/guide.md", "## Install\n\nRun the setup script.\n");

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    // memory search can return the relocated memory file
    let memory = analyzer
        .semantic_search("database choice", &["memory".to_string()])
        .await
        .unwrap();
    assert!(memory.iter().any(|r| r.starts_with("docs/MEMORY.md::")));

    // a docs-only search must not
    let docs = analyzer
        .semantic_search("database choice", &["docs".to_string()])
        .await
        .unwrap();
    assert!(docs.iter().all(|r| !r.starts_with("docs/MEMORY.md::")));
}

#[tokio::test]
async fn mtime_bump_marks_exactly_that_file_stale() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "a.py", "def alpha():\n    return 1\n");
    write(ws.path(), "b.py", "def beta():\n    return 2\n");

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    let before_a = analyzer.store().get_by_id("a.py::alpha").await.unwrap().parsed_at;
    let before_b = analyzer.store().get_by_id("b.py::beta").await.unwrap().parsed_at;
    assert!(!analyzer.store().is_stale("a.py").await);

    // push the mtime past the recorded watermark
    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    write(ws.path(), "a.py", "def alpha():\n    return 1\n");
    assert!(analyzer.store().is_stale("a.py").await);
    assert!(!analyzer.store().is_stale("b.py").await);

    analyzer.index_workspace().await;

    let after_a = analyzer.store().get_by_id("a.py::alpha").await.unwrap().parsed_at;
    let after_b = analyzer.store().get_by_id("b.py::beta").await.unwrap().parsed_at;
    assert!(after_a > before_a, "reparsed file advances its watermark");
    assert_eq!(after_b, before_b, "untouched file is not reparsed");
}

#[tokio::test]
async fn deleted_files_leave_the_index_on_cleanup() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "gone.py", "def vanish():\n    pass\n");

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;
    assert!(analyzer.store().get_by_id("gone.py::vanish").await.is_ok());

    std::fs::remove_file(ws.path().join("gone.py")).unwrap();
    analyzer.store().cleanup_missing().await;

    let err = analyzer.store().get_by_id("gone.py::vanish").await.unwrap_err();
    assert!(matches!(err, SourcererError::NotFound(_)));
}

#[tokio::test]
async fn reindex_leaves_exactly_one_version() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "v.py", "def one():\n    pass\n");

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;
    assert!(analyzer.store().get_by_id("v.py::one").await.is_ok());

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;
    write(ws.path(), "v.py", "def two():\n    pass\n");

    // concurrent passes coalesce; afterwards only the new version remains
    let (first, second) = tokio::join!(analyzer.index_workspace(), analyzer.index_workspace());
    let _ = (first, second);
    analyzer.index_workspace().await;

    assert!(analyzer.store().get_by_id("v.py::two").await.is_ok());
    assert!(
        analyzer.store().get_by_id("v.py::one").await.is_err(),
        "no chunk from the older version may remain"
    );
}

#[tokio::test]
async fn index_then_get_by_id_round_trips_chunks() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        "lib.py",
        "import os\n\nLIMIT = 10\n\ndef run():\n    return LIMIT\n",
    );

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    for id in ["lib.py::LIMIT", "lib.py::run"] {
        let chunk = analyzer.store().get_by_id(id).await.unwrap();
        assert_eq!(chunk.id, id);
        assert_eq!(chunk.file, "lib.py");
        assert!(chunk.start_line >= 1);
        assert!(chunk.end_line >= chunk.start_line);
        assert!(!chunk.source.is_empty());
    }

    // the import block is content-addressed
    let tracked = analyzer.store().tracked_files().await;
    assert_eq!(tracked, vec!["lib.py".to_string()]);
}

#[tokio::test]
async fn find_similar_excludes_the_source_chunk() {
    let ws = TempDir::new().unwrap();
    write(
        ws.path(),
        "sim.py",
        "def parse_config_file():\n    return load_config_file()\n\n\ndef read_config_file():\n    return load_config_file()\n",
    );

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    let similar = analyzer
        .find_similar_chunks("sim.py::parse_config_file")
        .await
        .unwrap();
    assert!(similar.iter().all(|s| !s.starts_with("sim.py::parse_config_file ")));
    assert!(similar.iter().any(|s| s.starts_with("sim.py::read_config_file ")));
}

#[tokio::test]
async fn search_respects_default_roles() {
    let ws = TempDir::new().unwrap();
    write(ws.path(), "MEMORY.md", "## Caching\n\nWe cache aggressively.\n");
    write(ws.path(), "src/cache.py", "def cache_get(key):\n    pass\n");

    let analyzer = build_analyzer(ws.path()).await;
    analyzer.index_workspace().await;

    // empty file_types default to src + docs; the memory chunk stays hidden
    let results = analyzer.semantic_search("cache", &[]).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| !r.starts_with("MEMORY.md::")));
}
