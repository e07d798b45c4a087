//! Orchestration: walk, classify, parse, embed, store
//!
//! The analyzer drives workspace passes on a bounded worker pool, keeps a
//! per-path lock so at most one worker handles a file at a time, and runs a
//! periodic maintenance loop reconciling the index with the workspace.

use crate::config::Config;
use crate::error::SourcererError;
use crate::parser::LanguageParsers;
use crate::store::IndexStore;
use crate::workspace::{FileRole, Walker, classify};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct Analyzer {
    config: Config,
    store: Arc<IndexStore>,
    /// Keyed per-path locks: at most one worker holds a given file at a time
    file_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Serializes passes; an overlapping maintenance tick is dropped
    pass_lock: Mutex<()>,
    /// Idle parser registries checked out by workers during a pass
    parser_pool: Mutex<Vec<LanguageParsers>>,
    /// Stale-file count observed at the most recent walk
    pending_files: AtomicUsize,
    last_indexed_at: std::sync::RwLock<Option<DateTime<Utc>>>,
    cancel: CancellationToken,
}

impl Analyzer {
    /// Open the store and start the maintenance loop.
    ///
    /// A store-level failure to open the backing database is fatal and
    /// surfaces here.
    pub async fn new(config: Config) -> Result<Arc<Self>, SourcererError> {
        let cancel = CancellationToken::new();
        let store = IndexStore::open(&config, cancel.clone()).await?;
        let analyzer = Self::with_parts(config, Arc::new(store), cancel);
        analyzer.spawn_maintenance();
        Ok(analyzer)
    }

    /// Assemble an analyzer around an already opened store without starting
    /// the maintenance loop. Tests and embedders-injected setups use this.
    pub fn with_parts(
        config: Config,
        store: Arc<IndexStore>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            file_locks: Mutex::new(HashMap::new()),
            pass_lock: Mutex::new(()),
            parser_pool: Mutex::new(Vec::new()),
            pending_files: AtomicUsize::new(0),
            last_indexed_at: std::sync::RwLock::new(None),
            cancel,
        })
    }

    /// Periodic reconciliation: every rescan interval, drop index entries
    /// for deleted files and re-index stale ones. Ticks that land during a
    /// running pass are skipped.
    pub fn spawn_maintenance(self: &Arc<Self>) {
        let analyzer = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(analyzer.config.indexing.rescan_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = analyzer.cancel.cancelled() => {
                        tracing::debug!("maintenance loop stopped");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                let Ok(_guard) = analyzer.pass_lock.try_lock() else {
                    tracing::debug!("previous pass still running, dropping tick");
                    continue;
                };
                analyzer.store.cleanup_missing().await;
                analyzer.run_pass().await;
            }
        });
    }

    /// One full workspace pass. Concurrent calls coalesce: a pass that
    /// arrives while another runs returns immediately.
    pub async fn index_workspace(&self) {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            tracing::debug!("index pass already running");
            return;
        };
        self.run_pass().await;
    }

    async fn run_pass(&self) {
        let walker = Walker::new(&self.config.workspace_root, &self.config.indexing)
            .with_cancellation(self.cancel.clone());
        let files = match tokio::task::spawn_blocking(move || walker.walk()).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "walker task failed");
                return;
            }
        };

        let mut stale: Vec<(PathBuf, String, FileRole)> = Vec::new();
        for abs in files {
            let rel = self.relative(&abs);
            let role = classify(Path::new(&rel));
            if !role.is_indexed() {
                continue;
            }
            if self.store.is_stale(&rel).await {
                stale.push((abs, rel, role));
            }
        }

        self.pending_files.store(stale.len(), Ordering::SeqCst);
        if !stale.is_empty() {
            tracing::info!(files = stale.len(), "indexing stale files");
        }

        stream::iter(stale)
            .for_each_concurrent(self.config.indexing.max_workers, |(abs, rel, role)| async move {
                if self.cancel.is_cancelled() {
                    return;
                }
                self.process_file(abs, rel, role).await;
            })
            .await;

        if !self.cancel.is_cancelled() {
            *self.last_indexed_at.write().expect("status lock poisoned") = Some(Utc::now());
        }
    }

    async fn process_file(&self, abs: PathBuf, rel: String, role: FileRole) {
        let lock = self.lock_for(&rel).await;
        let _guard = lock.lock().await;
        if self.cancel.is_cancelled() {
            return;
        }

        let timeout = Duration::from_secs(self.config.indexing.file_timeout_secs);
        match tokio::time::timeout(timeout, self.parse_and_index(abs, role)).await {
            Err(_) => {
                tracing::warn!(file = %rel, "file processing timed out, retrying next pass");
            }
            Ok(Err(e)) => {
                tracing::warn!(file = %rel, error = %e, "failed to index file");
            }
            Ok(Ok(())) => {
                let _ = self
                    .pending_files
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        Some(n.saturating_sub(1))
                    });
            }
        }
    }

    async fn parse_and_index(&self, abs: PathBuf, role: FileRole) -> Result<(), SourcererError> {
        let mut parsers = self
            .parser_pool
            .lock()
            .await
            .pop()
            .unwrap_or_default();

        let root = self.config.workspace_root.clone();
        let (parsers, parsed) = tokio::task::spawn_blocking(move || {
            let parsed = parsers.parse_file(&root, &abs, role);
            (parsers, parsed)
        })
        .await
        .map_err(|e| SourcererError::other(format!("parser task failed: {e}")))?;
        self.parser_pool.lock().await.push(parsers);

        let parsed = parsed?;
        self.store.index_file(&parsed).await
    }

    async fn lock_for(&self, rel: &str) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().await;
        locks
            .entry(rel.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn relative(&self, abs: &Path) -> String {
        abs.strip_prefix(&self.config.workspace_root)
            .unwrap_or(abs)
            .to_string_lossy()
            .into_owned()
    }

    // --- query surface ---

    pub async fn semantic_search(
        &self,
        query: &str,
        file_types: &[String],
    ) -> Result<Vec<String>, SourcererError> {
        let roles: Vec<FileRole> = file_types
            .iter()
            .filter_map(|t| FileRole::parse(t))
            .collect();
        self.store.search(query, &roles).await
    }

    pub async fn find_similar_chunks(&self, id: &str) -> Result<Vec<String>, SourcererError> {
        self.store.find_similar(id).await
    }

    /// Concatenate the sources of the requested chunks in the order supplied
    pub async fn get_chunk_code(&self, ids: &[String]) -> String {
        let mut parts = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_by_id(id).await {
                Ok(chunk) => parts.push(chunk.source),
                Err(_) => parts.push(format!("chunk not found: {id}")),
            }
        }
        parts.join("\n\n---\n\n")
    }

    /// `(pending stale files at the last walk, wall-clock end of the last
    /// successful pass)`
    pub fn status(&self) -> (usize, Option<DateTime<Utc>>) {
        let pending = self.pending_files.load(Ordering::SeqCst);
        let last = *self.last_indexed_at.read().expect("status lock poisoned");
        (pending, last)
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Cooperative shutdown: the maintenance loop exits, in-flight embedder
    /// retries abort at the next boundary, and the pool drains without
    /// starting new files.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
