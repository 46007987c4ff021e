//! SQLite storage for chunks and their embeddings.
//!
//! Embeddings are little-endian `f32` BLOBs; cosine similarity is computed
//! in Rust at query time.

use std::collections::HashSet;
use std::path::Path;

use reposeek_chunker::chunk::CodeChunk;
use reposeek_core::{ChunkType, ReposeekError, Result, SearchResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::embedding::{embedding_text, fingerprint};

const DIMENSIONS_KEY: &str = "embedding_dimensions";

/// Index statistics.
///
/// # Examples
///
/// ```
/// use reposeek_index::store::IndexStats;
///
/// let stats = IndexStats {
///     total_chunks: 42,
///     total_files: 7,
///     dimensions: Some(1024),
///     index_size_bytes: 65536,
/// };
/// assert_eq!(stats.total_files, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Number of distinct files with at least one chunk.
    pub total_files: usize,
    /// Embedding width recorded for this index, if anything was stored.
    pub dimensions: Option<usize>,
    /// Size of the database in bytes.
    pub index_size_bytes: u64,
}

/// Chunk store with vector search.
///
/// # Examples
///
/// ```
/// use reposeek_index::store::VectorStore;
///
/// let store = VectorStore::in_memory().unwrap();
/// assert_eq!(store.stats().unwrap().total_chunks, 0);
/// assert!(store.search(&[1.0, 0.0], 5).unwrap().is_empty());
/// ```
pub struct VectorStore {
    conn: Connection,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl VectorStore {
    /// Open or create a store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReposeekError::Database(format!("failed to create index directory: {e}"))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ReposeekError::Database(format!("failed to open database: {e}")))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create a store that lives only as long as this value.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ReposeekError::Database(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS chunks (
                    id TEXT PRIMARY KEY,
                    file_path TEXT NOT NULL,
                    name TEXT NOT NULL,
                    chunk_type TEXT NOT NULL,
                    start_line INTEGER NOT NULL,
                    end_line INTEGER NOT NULL,
                    parent_class TEXT,
                    docstring TEXT,
                    calls TEXT NOT NULL,
                    content TEXT NOT NULL,
                    content_hash TEXT NOT NULL,
                    embedding BLOB NOT NULL
                );

                CREATE INDEX IF NOT EXISTS chunks_file_path ON chunks(file_path);
                ",
            )
            .map_err(|e| ReposeekError::Database(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Embedding width recorded in metadata, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on query failure or corrupt metadata.
    pub fn dimensions(&self) -> Result<Option<usize>> {
        match self.get_metadata(DIMENSIONS_KEY)? {
            Some(v) => v.parse().map(Some).map_err(|_| {
                ReposeekError::Database(format!("corrupted dimension metadata in index: '{v}'"))
            }),
            None => Ok(None),
        }
    }

    /// Record `dimensions` as the embedding width, or check it against the
    /// width already recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] if a different width is recorded.
    pub fn ensure_dimensions(&self, dimensions: usize) -> Result<()> {
        match self.dimensions()? {
            Some(stored) if stored != dimensions => Err(ReposeekError::Database(format!(
                "index was created with {stored}-dimensional embeddings but got {dimensions}; \
                 run `reposeek index --rebuild` to start over"
            ))),
            Some(_) => Ok(()),
            None => self.set_metadata(DIMENSIONS_KEY, &dimensions.to_string()),
        }
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ReposeekError::Database(format!(
                "failed to get metadata '{key}': {e}"
            ))),
        }
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ReposeekError::Database(format!("failed to set metadata '{key}': {e}")))?;
        Ok(())
    }

    /// Store chunks with their embeddings, replacing rows with the same id.
    ///
    /// All embeddings must have the width recorded for this index; the
    /// first call on an empty index records it. The batch is written in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on a dimension mismatch or write
    /// failure. Nothing from the batch is stored in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use reposeek_core::ChunkType;
    /// use reposeek_chunker::chunk::CodeChunk;
    /// use reposeek_index::store::VectorStore;
    ///
    /// let store = VectorStore::in_memory().unwrap();
    /// let chunk = CodeChunk {
    ///     content: "def ping():\n    return 1".into(),
    ///     chunk_type: ChunkType::Function,
    ///     file_path: PathBuf::from("net.py"),
    ///     start_line: 1,
    ///     end_line: 2,
    ///     name: "ping".into(),
    ///     parent_class: None,
    ///     docstring: None,
    ///     calls: vec![],
    /// };
    /// store.add(&[(chunk, vec![0.6, 0.8])]).unwrap();
    /// assert_eq!(store.dimensions().unwrap(), Some(2));
    /// ```
    pub fn add(&self, entries: &[(CodeChunk, Vec<f32>)]) -> Result<()> {
        let Some((_, first)) = entries.first() else {
            return Ok(());
        };
        let width = first.len();
        if let Some((chunk, _)) = entries.iter().find(|(_, e)| e.len() != width) {
            return Err(ReposeekError::Database(format!(
                "embedding for {} has a different width than the rest of the batch",
                chunk.chunk_id()
            )));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| ReposeekError::Database(format!("failed to begin transaction: {e}")))?;

        self.ensure_dimensions(width)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO chunks
                     (id, file_path, name, chunk_type, start_line, end_line, parent_class,
                      docstring, calls, content, content_hash, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )
                .map_err(|e| ReposeekError::Database(format!("failed to prepare insert: {e}")))?;

            for (chunk, embedding) in entries {
                let calls = serde_json::to_string(&chunk.calls)?;
                stmt.execute(params![
                    chunk.chunk_id(),
                    chunk.file_path.to_string_lossy().to_string(),
                    chunk.name,
                    chunk.chunk_type.to_string(),
                    chunk.start_line,
                    chunk.end_line,
                    chunk.parent_class,
                    chunk.docstring,
                    calls,
                    chunk.content,
                    fingerprint(&embedding_text(chunk)),
                    floats_to_bytes(embedding),
                ])
                .map_err(|e| ReposeekError::Database(format!("failed to insert chunk: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| ReposeekError::Database(format!("failed to commit chunks: {e}")))?;

        Ok(())
    }

    /// Whether a row with `id` exists and was stored from text with `content_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on query failure.
    pub fn is_current(&self, id: &str, content_hash: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE id = ?1 AND content_hash = ?2",
                params![id, content_hash],
                |row| row.get(0),
            )
            .map_err(|e| ReposeekError::Database(format!("failed to check chunk: {e}")))?;

        Ok(count > 0)
    }

    /// Delete every row whose id is not in `keep`. Returns how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on query or delete failure.
    pub fn retain(&self, keep: &HashSet<String>) -> Result<usize> {
        let stale: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM chunks")
                .map_err(|e| ReposeekError::Database(format!("failed to prepare query: {e}")))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| ReposeekError::Database(format!("failed to query ids: {e}")))?;

            let mut stale = Vec::new();
            for row in rows {
                let id =
                    row.map_err(|e| ReposeekError::Database(format!("failed to read row: {e}")))?;
                if !keep.contains(&id) {
                    stale.push(id);
                }
            }
            stale
        };

        for id in &stale {
            self.conn
                .execute("DELETE FROM chunks WHERE id = ?1", params![id])
                .map_err(|e| ReposeekError::Database(format!("failed to delete chunk: {e}")))?;
        }

        Ok(stale.len())
    }

    /// The `top_k` stored chunks most similar to `query_embedding`, best first.
    ///
    /// Scores are cosine similarity in `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on query failure.
    pub fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare(
                "SELECT file_path, name, chunk_type, start_line, end_line, parent_class,
                        docstring, content, embedding
                 FROM chunks",
            )
            .map_err(|e| ReposeekError::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let chunk_type: String = row.get(2)?;
                let chunk_type = chunk_type.parse::<ChunkType>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?;
                let embedding_bytes: Vec<u8> = row.get(8)?;

                Ok(SearchResult {
                    file_path: row.get::<_, String>(0)?.into(),
                    name: row.get(1)?,
                    chunk_type,
                    line_start: row.get(3)?,
                    line_end: row.get(4)?,
                    parent_class: row.get(5)?,
                    docstring: row.get(6)?,
                    code: row.get(7)?,
                    score: cosine_similarity(query_embedding, &bytes_to_floats(&embedding_bytes)),
                })
            })
            .map_err(|e| ReposeekError::Database(format!("failed to query chunks: {e}")))?;

        let mut scored = Vec::new();
        for row in rows {
            scored.push(row.map_err(|e| ReposeekError::Database(format!("failed to read row: {e}")))?);
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Remove every chunk and the recorded dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on delete failure.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM chunks; DELETE FROM metadata;")
            .map_err(|e| ReposeekError::Database(format!("failed to clear index: {e}")))?;
        Ok(())
    }

    /// Get index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Database`] on query failure.
    pub fn stats(&self) -> Result<IndexStats> {
        let (total_chunks, total_files): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT file_path) FROM chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| ReposeekError::Database(format!("failed to count chunks: {e}")))?;

        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(IndexStats {
            total_chunks: total_chunks as usize,
            total_files: total_files as usize,
            dimensions: self.dimensions()?,
            index_size_bytes: (page_count * page_size) as u64,
        })
    }
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    floats.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}
