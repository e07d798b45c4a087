//! File-role classification from workspace-relative paths

use std::path::Path;

/// Role assigned to a file; stored on every chunk as its `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Memory,
    Docs,
    Src,
    Tests,
    Ignore,
}

/// Basenames that are project memory wherever they live
const MEMORY_BASENAMES: &[&str] = &["MEMORY.md", "CLAUDE.md", "decisions.md", "NOTES.md"];

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Memory => "memory",
            FileRole::Docs => "docs",
            FileRole::Src => "src",
            FileRole::Tests => "tests",
            FileRole::Ignore => "ignore",
        }
    }

    pub fn parse(s: &str) -> Option<FileRole> {
        match s {
            "memory" => Some(FileRole::Memory),
            "docs" => Some(FileRole::Docs),
            "src" => Some(FileRole::Src),
            "tests" => Some(FileRole::Tests),
            "ignore" => Some(FileRole::Ignore),
            _ => None,
        }
    }

    /// Whether files with this role enter the index at all
    pub fn is_indexed(&self) -> bool {
        !matches!(self, FileRole::Ignore)
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a workspace-relative path.
///
/// Rules apply in order, first match wins. Basename rules dominate path rules
/// so memory files keep their role even when filed under `docs/` or a
/// subproject.
pub fn classify(rel_path: &Path) -> FileRole {
    let basename = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if MEMORY_BASENAMES.contains(&basename) {
        return FileRole::Memory;
    }

    if is_test_basename(basename) || under_top_level(rel_path, &["test", "tests"]) {
        return FileRole::Tests;
    }

    if basename.starts_with("README.") || under_top_level(rel_path, &["docs"]) {
        return FileRole::Docs;
    }

    match extension(basename) {
        Some("md") | Some("markdown") => FileRole::Docs,
        Some("go") | Some("ts") | Some("tsx") | Some("js") | Some("jsx") | Some("mjs")
        | Some("py") => FileRole::Src,
        _ => FileRole::Ignore,
    }
}

fn extension(basename: &str) -> Option<&str> {
    basename.rsplit_once('.').map(|(_, ext)| ext)
}

fn is_test_basename(basename: &str) -> bool {
    if let Some((stem, _ext)) = basename.rsplit_once('.')
        && stem.ends_with("_test")
    {
        return true;
    }

    basename.starts_with("test_") && basename.ends_with(".py")
}

fn under_top_level(rel_path: &Path, names: &[&str]) -> bool {
    rel_path
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| names.contains(&first))
}
