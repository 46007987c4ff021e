//! Voyage API client for embedding code chunks.
//!
//! Uses `input_type: "document"` for indexing and `input_type: "query"` for
//! searching.

use async_trait::async_trait;
use reposeek_chunker::chunk::CodeChunk;
use reposeek_core::{ChunkType, EmbeddingConfig, ReposeekError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const BATCH_DELAY_MS: u64 = 200;

/// Anything that turns text into vectors.
///
/// Documents and queries are embedded separately because providers tune
/// the two differently.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed documents, returning one vector per input in the same order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>>;
}

/// Render a chunk as the text that gets embedded.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposeek_core::ChunkType;
/// use reposeek_chunker::chunk::CodeChunk;
/// use reposeek_index::embedding::embedding_text;
///
/// let chunk = CodeChunk {
///     content: "def login(user):\n    check(user)".into(),
///     chunk_type: ChunkType::Function,
///     file_path: PathBuf::from("auth.py"),
///     start_line: 1,
///     end_line: 2,
///     name: "login".into(),
///     parent_class: None,
///     docstring: Some("Log a user in.".into()),
///     calls: vec!["check".into()],
/// };
/// assert_eq!(
///     embedding_text(&chunk),
///     "Function login\nDescription: Log a user in.\nCalls: check\nCode:\ndef login(user):\n    check(user)"
/// );
/// ```
pub fn embedding_text(chunk: &CodeChunk) -> String {
    let mut parts = Vec::with_capacity(4);

    parts.push(match (&chunk.parent_class, chunk.chunk_type) {
        (Some(class), _) => format!("Method {} in class {class}", chunk.name),
        (None, ChunkType::Class) => format!("Class {}", chunk.name),
        (None, _) => format!("Function {}", chunk.name),
    });

    if let Some(doc) = chunk.docstring.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("Description: {doc}"));
    }

    if !chunk.calls.is_empty() {
        parts.push(format!("Calls: {}", chunk.calls.join(", ")));
    }

    parts.push(format!("Code:\n{}", chunk.content));

    parts.join("\n")
}

/// SHA-256 of `text` as lowercase hex.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Client for the Voyage embedding API.
///
/// # Examples
///
/// ```
/// use reposeek_index::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "voyage-code-3");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    batch_size: usize,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimension: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    /// Create a client with the given API key and default settings.
    pub fn new(api_key: &str) -> Self {
        let defaults = EmbeddingConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: defaults.model,
            dimensions: defaults.dimensions,
            batch_size: defaults.batch_size,
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `VOYAGE_API_KEY` env var if no key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Config`] if no API key is available or the
    /// provider is not supported.
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self> {
        if config.provider != "voyage" {
            return Err(ReposeekError::Config(format!(
                "unsupported embedding provider '{}': only \"voyage\" is available",
                config.provider
            )));
        }

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("VOYAGE_API_KEY").ok())
            .ok_or_else(|| {
                ReposeekError::Config(
                    "embedding API key not found: set embedding.api_key in .reposeek.toml or VOYAGE_API_KEY env var".into(),
                )
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Width requested from the API, or `None` for the model's default.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn request(&self, input: &[String], input_type: &str) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input,
            input_type,
            output_dimension: self.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ReposeekError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(ReposeekError::Embedding(format!(
                "Voyage API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ReposeekError::Embedding(format!("failed to parse response: {e}")))?;

        if embed_response.data.len() != input.len() {
            return Err(ReposeekError::Embedding(format!(
                "expected {} embeddings, got {}",
                input.len(),
                embed_response.data.len()
            )));
        }

        let embeddings: Vec<Vec<f32>> = embed_response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect();
        check_widths(&embeddings, self.dimensions)?;
        Ok(embeddings)
    }
}

/// Every vector must have the requested width, when one was requested.
fn check_widths(embeddings: &[Vec<f32>], expected: Option<usize>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match embeddings.iter().find(|e| e.len() != expected) {
        Some(bad) => Err(ReposeekError::Embedding(format!(
            "requested {expected}-dimensional embeddings, got {}",
            bad.len()
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    /// Sends sub-batches of `batch_size` with a short pause between them.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            tracing::debug!("embedding batch {} ({} texts)", i + 1, batch.len());
            all_embeddings.extend(self.request(batch, "document").await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let input = [query.to_string()];
        self.request(&input, "query")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReposeekError::Embedding("empty response from Voyage API".into()))
    }
}
