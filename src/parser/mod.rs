//! File parsing into addressable chunks
//!
//! Two parser families: structural (tree-sitter over source languages) and
//! sectional (markdown split by heading hierarchy). Both produce ordered
//! [`Chunk`] lists with stable identifiers assigned by [`identity`].

pub mod identity;
mod markdown;
mod source;

pub use source::{Language, SourceParser};

use crate::error::ParseError;
use crate::workspace::{FileRole, classify};
use std::collections::HashMap;
use std::path::Path;

/// The atomic unit of indexing: one named entity, import block, or markdown
/// section with its exact span in the original file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Workspace-relative file path
    pub file: String,
    /// Role inherited from the file classification
    pub role: FileRole,
    /// Symbolic path within the file (`Type::method`, `A > B`); empty for
    /// anonymous chunks
    pub path: String,
    /// Short human-readable label ("function `Foo`", "section `## Errors`")
    pub summary: String,
    /// Raw textual content; these are the bytes that get embedded
    pub source: String,
    /// 1-based inclusive location in the original file
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    /// Unix seconds at the moment of parsing
    pub parsed_at: i64,
    /// Globally unique id; a pure function of (file, path, source)
    pub id: String,
}

impl Chunk {
    pub(crate) fn new(
        file: &str,
        role: FileRole,
        path: String,
        summary: String,
        source: String,
        span: (u32, u32, u32, u32),
        parsed_at: i64,
    ) -> Self {
        Self {
            file: file.to_string(),
            role,
            path,
            summary,
            source,
            start_line: span.0,
            start_column: span.1,
            end_line: span.2,
            end_column: span.3,
            parsed_at,
            id: String::new(),
        }
    }

    /// Formatted line range for display, singular when the chunk is one line
    pub fn line_range(&self) -> String {
        if self.start_line == self.end_line {
            format!("line {}", self.start_line)
        } else {
            format!("lines {}-{}", self.start_line, self.end_line)
        }
    }
}

/// A parsed file: the unit of reindexing
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Workspace-relative path
    pub path: String,
    /// Ordered chunks; empty when the file failed to parse
    pub chunks: Vec<Chunk>,
}

/// Per-worker parser registry.
///
/// Tree-sitter parsers hold mutable state, so each worker owns its own
/// registry; parsers are created lazily per language and reused across files.
pub struct LanguageParsers {
    parsers: HashMap<Language, SourceParser>,
}

impl LanguageParsers {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Parse one workspace file into chunks.
    ///
    /// A file the grammar cannot parse yields an empty chunk list; only I/O
    /// and unsupported-extension problems surface as errors.
    pub fn parse_file(
        &mut self,
        workspace_root: &Path,
        path: &Path,
        role: FileRole,
    ) -> Result<ParsedFile, ParseError> {
        let rel = path
            .strip_prefix(workspace_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        let source = std::fs::read_to_string(path).map_err(|e| ParseError::ReadFailed {
            file: rel.clone(),
            reason: e.to_string(),
        })?;

        let parsed_at = chrono::Utc::now().timestamp();

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let mut chunks = match ext.as_str() {
            "md" | "markdown" => markdown::parse(&rel, role, &source, parsed_at),
            _ => {
                let language = Language::from_extension(&ext)
                    .ok_or_else(|| ParseError::UnsupportedLanguage(ext.clone()))?;
                let parser = match self.parsers.entry(language) {
                    std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                    std::collections::hash_map::Entry::Vacant(e) => {
                        e.insert(SourceParser::new(language)?)
                    }
                };
                parser.parse(&rel, role, &source, parsed_at)
            }
        };

        identity::assign_ids(&rel, &mut chunks);

        Ok(ParsedFile { path: rel, chunks })
    }
}

impl Default for LanguageParsers {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify and parse in one step, used by tests and the analyzer workers
pub fn parse_workspace_file(
    parsers: &mut LanguageParsers,
    workspace_root: &Path,
    path: &Path,
) -> Result<Option<ParsedFile>, ParseError> {
    let rel = path.strip_prefix(workspace_root).unwrap_or(path);
    let role = classify(rel);
    if !role.is_indexed() {
        return Ok(None);
    }
    parsers.parse_file(workspace_root, path, role).map(Some)
}
