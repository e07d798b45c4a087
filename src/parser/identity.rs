//! Stable chunk identifiers
//!
//! Named entities get path-qualified ids (`file::Type::method`); anonymous
//! chunks get content-derived ids (`file::hex16`) so identity survives moves
//! that do not change the content. Trimming makes the hash stable across
//! leading/trailing whitespace edits; the stored source is never normalized.

use super::Chunk;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// First 16 hex digits of the SHA-256 of the trimmed source
pub fn content_hash16(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.trim().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Derive the id for a single chunk, ignoring collisions
pub fn chunk_id(file: &str, path: &str, source: &str) -> String {
    if path.is_empty() {
        format!("{file}::{}", content_hash16(source))
    } else {
        format!("{file}::{path}")
    }
}

/// Assign ids to every chunk of one file.
///
/// Within a file, a repeated id gets an `_<n>` suffix where `n` is the
/// 1-based occurrence counter; the first occurrence keeps the bare id.
pub fn assign_ids(file: &str, chunks: &mut [Chunk]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for chunk in chunks {
        let base = chunk_id(file, &chunk.path, &chunk.source);
        let n = seen
            .entry(base.clone())
            .and_modify(|n| *n += 1)
            .or_insert(1);
        chunk.id = if *n == 1 {
            base
        } else {
            format!("{base}_{n}")
        };
    }
}
