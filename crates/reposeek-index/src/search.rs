//! Semantic search over indexed chunks.

use std::collections::HashSet;

use reposeek_chunker::chunk::CodeChunk;
use reposeek_core::{ReposeekError, Result, SearchResult};
use serde::{Deserialize, Serialize};

use crate::embedding::{embedding_text, fingerprint, Embedder};
use crate::store::VectorStore;

/// Number of results returned when the caller does not choose.
pub const DEFAULT_TOP_K: usize = 5;

/// Outcome of one [`SearchEngine::index_chunks`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    /// Chunks sent to the embedder and stored.
    pub embedded: usize,
    /// Chunks whose stored row already matched.
    pub unchanged: usize,
    /// Stored rows deleted because their chunk is gone.
    pub removed: usize,
    /// Chunks dropped because an earlier chunk had the same id.
    pub duplicates: usize,
}

/// Embedder plus store: indexes chunks and answers queries.
///
/// # Examples
///
/// ```no_run
/// use reposeek_index::embedding::EmbeddingClient;
/// use reposeek_index::search::SearchEngine;
/// use reposeek_index::store::VectorStore;
///
/// # async fn example() {
/// let engine = SearchEngine::new(VectorStore::in_memory().unwrap(), EmbeddingClient::new("key"));
/// let results = engine.search("where are passwords hashed?", 5).await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct SearchEngine<E> {
    store: VectorStore,
    embedder: E,
}

impl<E: Embedder> SearchEngine<E> {
    /// Create an engine over an opened store.
    pub fn new(store: VectorStore, embedder: E) -> Self {
        Self { store, embedder }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Make the store hold exactly `chunks`.
    ///
    /// Chunks already stored with identical embedding text are not
    /// re-embedded. Rows whose id is absent from `chunks` are deleted. When
    /// two chunks share an id, the first wins.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Embedding`] if the embedder fails or returns
    /// the wrong number of vectors, and [`ReposeekError::Database`] on
    /// storage failure.
    pub async fn index_chunks(&self, chunks: Vec<CodeChunk>) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut seen = HashSet::with_capacity(chunks.len());
        let mut pending = Vec::new();
        let mut texts = Vec::new();

        for chunk in chunks {
            let id = chunk.chunk_id();
            if !seen.insert(id.clone()) {
                tracing::warn!("duplicate chunk id {id}, keeping the first occurrence");
                report.duplicates += 1;
                continue;
            }

            let text = embedding_text(&chunk);
            if self.store.is_current(&id, &fingerprint(&text))? {
                report.unchanged += 1;
            } else {
                pending.push(chunk);
                texts.push(text);
            }
        }

        report.removed = self.store.retain(&seen)?;

        if !pending.is_empty() {
            let embeddings = self.embedder.embed_documents(&texts).await?;
            if embeddings.len() != pending.len() {
                return Err(ReposeekError::Embedding(format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    pending.len()
                )));
            }
            report.embedded = pending.len();
            let entries: Vec<(CodeChunk, Vec<f32>)> = pending.into_iter().zip(embeddings).collect();
            self.store.add(&entries)?;
        }

        tracing::info!(
            "indexed {} chunks ({} unchanged, {} removed)",
            report.embedded,
            report.unchanged,
            report.removed
        );

        Ok(report)
    }

    /// The `top_k` chunks closest to `query`, best first.
    ///
    /// A blank query returns nothing without calling the embedder.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError`] if embedding or the database query fails.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        self.store.search(&query_embedding, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reposeek_core::ChunkType;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VOCAB: [&str; 4] = ["login", "parse", "total", "slug"];

    /// Bag-of-words over a tiny vocabulary, counting documents embedded.
    #[derive(Default)]
    struct WordCountEmbedder {
        documents: AtomicUsize,
        queries: AtomicUsize,
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32 + 0.01)
            .collect()
    }

    #[async_trait]
    impl Embedder for WordCountEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.documents.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vectorize(t)).collect())
        }

        async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(vectorize(query))
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    /// Returns whatever width the model happens to produce.
    struct WideEmbedder(usize);

    #[async_trait]
    impl Embedder for WideEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5; self.0]).collect())
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; self.0])
        }
    }

    fn function(name: &str, body: &str, line: u32) -> CodeChunk {
        CodeChunk {
            content: format!("def {name}():\n    {body}"),
            chunk_type: ChunkType::Function,
            file_path: PathBuf::from("app.py"),
            start_line: line,
            end_line: line + 1,
            name: name.into(),
            parent_class: None,
            docstring: None,
            calls: Vec::new(),
        }
    }

    fn engine() -> SearchEngine<WordCountEmbedder> {
        SearchEngine::new(VectorStore::in_memory().unwrap(), WordCountEmbedder::default())
    }

    fn sample() -> Vec<CodeChunk> {
        vec![
            function("login", "check_login(user)", 1),
            function("parse_args", "return parse(argv)", 4),
            function("cart_total", "return total(items)", 7),
        ]
    }

    #[tokio::test]
    async fn search_ranks_relevant_chunk_first() {
        let engine = engine();
        engine.index_chunks(sample()).await.unwrap();

        let results = engine.search("where is the total computed", DEFAULT_TOP_K).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "cart_total");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn blank_query_skips_embedder() {
        let engine = engine();
        engine.index_chunks(sample()).await.unwrap();

        assert!(engine.search("   ", 5).await.unwrap().is_empty());
        assert_eq!(engine.embedder.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reindex_skips_unchanged_and_removes_missing() {
        let engine = engine();
        let first = engine.index_chunks(sample()).await.unwrap();
        assert_eq!(first.embedded, 3);

        let mut next = sample();
        next.remove(1);
        next[0].docstring = Some("Log the user in.".into());
        let second = engine.index_chunks(next).await.unwrap();

        assert_eq!(
            second,
            IndexReport {
                embedded: 1,
                unchanged: 1,
                removed: 1,
                duplicates: 0,
            }
        );
        assert_eq!(engine.embedder.documents.load(Ordering::SeqCst), 4);
        assert_eq!(engine.store().stats().unwrap().total_chunks, 2);
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first() {
        let engine = engine();
        let mut chunks = sample();
        let mut twin = chunks[0].clone();
        twin.content = "def login():\n    pass".into();
        chunks.push(twin);

        let report = engine.index_chunks(chunks).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.embedded, 3);

        let results = engine.search("login", 1).await.unwrap();
        assert_eq!(results[0].code, "def login():\n    check_login(user)");
    }

    #[tokio::test]
    async fn empty_input_embeds_nothing() {
        let engine = engine();
        let report = engine.index_chunks(Vec::new()).await.unwrap();
        assert_eq!(report, IndexReport::default());
        assert_eq!(engine.embedder.documents.load(Ordering::SeqCst), 0);
        assert!(engine.search("login", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_an_error() {
        let engine = SearchEngine::new(VectorStore::in_memory().unwrap(), ShortEmbedder);
        let err = engine.index_chunks(sample()).await.unwrap_err();
        assert!(matches!(err, ReposeekError::Embedding(_)));
        assert_eq!(engine.store().stats().unwrap().total_chunks, 0);
    }

    #[tokio::test]
    async fn fresh_store_records_width_of_first_batch() {
        let engine = SearchEngine::new(VectorStore::in_memory().unwrap(), WideEmbedder(1536));
        assert_eq!(engine.store().dimensions().unwrap(), None);

        let report = engine.index_chunks(sample()).await.unwrap();
        assert_eq!(report.embedded, 3);
        assert_eq!(engine.store().dimensions().unwrap(), Some(1536));
        assert_eq!(engine.search("total", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn configured_width_must_match_model_output() {
        let store = VectorStore::in_memory().unwrap();
        store.ensure_dimensions(1024).unwrap();
        let engine = SearchEngine::new(store, WideEmbedder(1536));

        let err = engine.index_chunks(sample()).await.unwrap_err();
        assert!(matches!(err, ReposeekError::Database(_)));
        assert_eq!(engine.store().stats().unwrap().total_chunks, 0);
    }
}
