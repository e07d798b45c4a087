//! Directory traversal filtered by extension allow-list and ignore policy

use crate::config::IndexingConfig;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Enumerates workspace files eligible for indexing.
///
/// Respects `.gitignore`-style ignore files and never descends into the
/// hard-excluded directories (the index store directory among them). Yields
/// regular files whose extension is on the allow-list. Depth-first, but
/// callers must not rely on any ordering.
pub struct Walker {
    root: PathBuf,
    allowed_extensions: Vec<String>,
    excluded_dirs: Vec<String>,
    cancel: Option<CancellationToken>,
}

impl Walker {
    pub fn new(root: impl AsRef<Path>, config: &IndexingConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            allowed_extensions: config.allowed_extensions.clone(),
            excluded_dirs: config.excluded_dirs.clone(),
            cancel: None,
        }
    }

    /// Stop the walk early when the token fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    fn extension_allowed(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let dotted = format!(".{}", ext.to_lowercase());
        self.allowed_extensions.iter().any(|a| *a == dotted)
    }

    /// Walk the tree once and collect eligible absolute file paths.
    ///
    /// Unreadable directories are logged and skipped; siblings are still
    /// visited.
    pub fn walk(&self) -> Vec<PathBuf> {
        let excluded = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .git_global(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir {
                    return true;
                }
                entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !excluded.iter().any(|d| d == name))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            if self.is_cancelled() {
                tracing::debug!("walk cancelled after {} files", files.len());
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            if self.extension_allowed(path) {
                files.push(path.to_path_buf());
            }
        }

        tracing::debug!("walk found {} candidate files", files.len());
        files
    }
}
