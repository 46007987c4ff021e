use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of semantic unit a chunk represents.
///
/// # Examples
///
/// ```
/// use reposeek_core::ChunkType;
///
/// let t: ChunkType = serde_json::from_str("\"method\"").unwrap();
/// assert_eq!(t, ChunkType::Method);
/// assert_eq!(ChunkType::Class.to_string(), "class");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    /// A module-level function.
    Function,
    /// A function defined directly inside a class body.
    Method,
    /// A class definition (header only).
    Class,
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkType::Function => write!(f, "function"),
            ChunkType::Method => write!(f, "method"),
            ChunkType::Class => write!(f, "class"),
        }
    }
}

impl FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "function" => Ok(ChunkType::Function),
            "method" => Ok(ChunkType::Method),
            "class" => Ok(ChunkType::Class),
            other => Err(format!("unknown chunk type: {other}")),
        }
    }
}

/// A result from semantic code search.
///
/// # Examples
///
/// ```
/// use reposeek_core::{ChunkType, SearchResult};
/// use std::path::PathBuf;
///
/// let result = SearchResult {
///     name: "connect".into(),
///     chunk_type: ChunkType::Method,
///     file_path: PathBuf::from("db/pool.py"),
///     line_start: 10,
///     line_end: 25,
///     parent_class: Some("Pool".into()),
///     docstring: None,
///     code: "def connect(self): ...".into(),
///     score: 0.92,
/// };
/// assert_eq!(result.display_name(), "Pool.connect");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Name of the matched unit.
    pub name: String,
    /// Kind of the matched unit.
    pub chunk_type: ChunkType,
    /// Path to the file containing the match.
    pub file_path: PathBuf,
    /// First line of the matched unit.
    pub line_start: u32,
    /// Last line of the matched unit.
    pub line_end: u32,
    /// Enclosing class for methods.
    pub parent_class: Option<String>,
    /// Docstring of the matched unit, if any.
    pub docstring: Option<String>,
    /// Stored chunk content.
    pub code: String,
    /// Cosine similarity to the query (higher is better).
    pub score: f64,
}

impl SearchResult {
    /// `Class.name` for methods, otherwise just `name`.
    pub fn display_name(&self) -> String {
        match &self.parent_class {
            Some(class) => format!("{class}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use reposeek_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
