//! The chunk entity handed to embedding and storage.

use std::path::PathBuf;

use reposeek_core::ChunkType;
use serde::{Deserialize, Serialize};

/// Name used when a definition has no identifier child.
pub const UNKNOWN_NAME: &str = "unknown";

/// A semantic unit of code (function, method, or class) extracted from one file.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposeek_core::ChunkType;
/// use reposeek_chunker::chunk::CodeChunk;
///
/// let chunk = CodeChunk {
///     content: "def save(self):\n    self.db.commit()".into(),
///     chunk_type: ChunkType::Method,
///     file_path: PathBuf::from("models/user.py"),
///     start_line: 12,
///     end_line: 13,
///     name: "save".into(),
///     parent_class: Some("User".into()),
///     docstring: None,
///     calls: vec!["self.db.commit".into()],
/// };
/// assert_eq!(chunk.qualified_name(), "User.save");
/// assert_eq!(chunk.chunk_id(), "models/user.py:save:12-13");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunk {
    /// Source text of the unit. For classes, only the header before the
    /// first method.
    pub content: String,
    /// Function, method, or class.
    pub chunk_type: ChunkType,
    /// Path to the source file, relative to the repository root.
    pub file_path: PathBuf,
    /// First line of the full definition (1-indexed).
    pub start_line: u32,
    /// Last line of the full definition (1-indexed, inclusive).
    pub end_line: u32,
    /// Identifier of the unit, or [`UNKNOWN_NAME`].
    pub name: String,
    /// Enclosing class; set only for methods.
    pub parent_class: Option<String>,
    /// First-statement string literal of the body, trimmed and truncated.
    pub docstring: Option<String>,
    /// Distinct callee references in first-occurrence order.
    pub calls: Vec<String>,
}

impl CodeChunk {
    /// Stable identifier for storage: `file_path:name:start_line-end_line`.
    pub fn chunk_id(&self) -> String {
        format!(
            "{}:{}:{}-{}",
            self.file_path.display(),
            self.name,
            self.start_line,
            self.end_line
        )
    }

    /// `Class.method` for methods, otherwise the bare name.
    pub fn qualified_name(&self) -> String {
        match &self.parent_class {
            Some(class) => format!("{class}.{}", self.name),
            None => self.name.clone(),
        }
    }
}
