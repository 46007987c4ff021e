//! Semantic chunking of source repositories.
//!
//! Walks a repository, parses each source file with tree-sitter, and splits
//! it into self-describing units (functions, methods, and class headers)
//! with names, line spans, docstrings, and call references attached.

pub mod chunk;
pub mod chunker;
pub mod extract;
pub mod grammar;
pub mod walker;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use reposeek_core::{ReposeekConfig, Result};

use crate::chunk::CodeChunk;
use crate::chunker::Chunker;
use crate::walker::Language;

/// Chunk every supported file in the repository at `root`.
///
/// A file that cannot be parsed is logged and skipped; the pass carries on
/// with the rest. Chunks are returned grouped by file in path order, and in
/// traversal order within each file.
///
/// # Errors
///
/// Returns [`reposeek_core::ReposeekError`] only if `root` is missing or
/// unreadable.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use reposeek_core::ReposeekConfig;
/// use reposeek_chunker::chunk_repo;
///
/// let chunks = chunk_repo(Path::new("."), &ReposeekConfig::default()).unwrap();
/// println!("Found {} chunks", chunks.len());
/// ```
pub fn chunk_repo(root: &Path, config: &ReposeekConfig) -> Result<Vec<CodeChunk>> {
    let files = walker::walk_repo(root, &config.walker)?;
    let mut chunkers: HashMap<Language, Chunker> = HashMap::new();
    let mut all_chunks = Vec::new();
    let mut skipped = 0usize;

    for file in &files {
        let chunker = match chunkers.entry(file.language) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                match Chunker::with_config(file.language, config.chunker.clone()) {
                    Ok(chunker) => entry.insert(chunker),
                    Err(err) => {
                        tracing::warn!("skipping {}: {err}", file.path.display());
                        skipped += 1;
                        continue;
                    }
                }
            }
        };

        match chunker.chunk_file(&file.path, &file.content) {
            Ok(chunks) => all_chunks.extend(chunks),
            Err(err) => {
                tracing::warn!("skipping {}: {err}", file.path.display());
                skipped += 1;
            }
        }
    }

    tracing::info!(
        files = files.len(),
        skipped,
        chunks = all_chunks.len(),
        "chunked {}",
        root.display()
    );

    Ok(all_chunks)
}
