use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration loaded from `.reposeek.toml`.
///
/// The CLI reads `--config`, else `./.reposeek.toml`, else defaults. The
/// embedding API key also falls back to `VOYAGE_API_KEY`.
///
/// # Examples
///
/// ```
/// use reposeek_core::ReposeekConfig;
///
/// let config = ReposeekConfig::default();
/// assert_eq!(config.search.top_k, 5);
/// assert_eq!(config.chunker.max_calls, 15);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReposeekConfig {
    /// Which files the repository walker considers.
    #[serde(default)]
    pub walker: WalkerConfig,
    /// Limits applied while building chunks.
    #[serde(default)]
    pub chunker: ChunkerConfig,
    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Query settings.
    #[serde(default)]
    pub search: SearchConfig,
}

impl ReposeekConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReposeekError::Io`] if the file cannot be read, or
    /// [`crate::ReposeekError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reposeek_core::ReposeekConfig;
    /// use std::path::Path;
    ///
    /// let config = ReposeekConfig::from_file(Path::new(".reposeek.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReposeekError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposeek_core::ReposeekConfig;
    ///
    /// let toml = r#"
    /// [search]
    /// top_k = 10
    /// "#;
    /// let config = ReposeekConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.search.top_k, 10);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Repository walker configuration.
///
/// # Examples
///
/// ```
/// use reposeek_core::WalkerConfig;
///
/// let config = WalkerConfig::default();
/// assert!(config.exclude.is_empty());
/// assert!(!config.respect_gitignore);
/// assert_eq!(config.max_file_size, 1_048_576);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Extra path segments to exclude, on top of the built-in set.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Honour `.gitignore` and friends while walking (default: false).
    #[serde(default)]
    pub respect_gitignore: bool,
    /// Files larger than this many bytes are skipped (default: 1 MiB).
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    1_048_576
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            respect_gitignore: false,
            max_file_size: default_max_file_size(),
        }
    }
}

/// Limits applied to extracted chunk metadata.
///
/// # Examples
///
/// ```
/// use reposeek_core::ChunkerConfig;
///
/// let config = ChunkerConfig::default();
/// assert_eq!(config.max_calls, 15);
/// assert_eq!(config.max_docstring_chars, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum number of distinct call references kept per chunk (default: 15).
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    /// Docstrings are hard-truncated to this many characters (default: 300).
    #[serde(default = "default_max_docstring_chars")]
    pub max_docstring_chars: usize,
}

fn default_max_calls() -> usize {
    15
}

fn default_max_docstring_chars() -> usize {
    300
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_calls: default_max_calls(),
            max_docstring_chars: default_max_docstring_chars(),
        }
    }
}

/// Configuration for the embedding provider.
///
/// # Examples
///
/// ```
/// use reposeek_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "voyage");
/// assert_eq!(config.model, "voyage-code-3");
/// assert_eq!(config.dimensions, None);
/// assert_eq!(config.batch_size, 128);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider (default: `"voyage"`).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// API key for the embedding provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Model name (default: `"voyage-code-3"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Output width to request from the model. Unset means the model's
    /// default, whatever width that turns out to be.
    pub dimensions: Option<usize>,
    /// Documents sent per request (default: 128).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "voyage".into()
}

fn default_embedding_model() -> String {
    "voyage-code-3".into()
}

fn default_batch_size() -> usize {
    128
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            base_url: None,
            model: default_embedding_model(),
            dimensions: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Query behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of results returned per query (default: 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}
