use std::path::PathBuf;

/// Errors that can occur across reposeek.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use reposeek_core::ReposeekError;
///
/// let err = ReposeekError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ReposeekError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cloning or opening a git repository failed.
    #[error("git error: {0}")]
    Git(String),

    /// Source code could not be parsed into a syntax tree.
    #[error("parse error: {0}")]
    Parse(String),

    /// Embedding provider request or response error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector store failure.
    #[error("database error: {0}")]
    Database(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file or directory was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ReposeekError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn parse_error_displays_message() {
        let err = ReposeekError::Parse("no tree".into());
        assert_eq!(err.to_string(), "parse error: no tree");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = ReposeekError::FileNotFound(PathBuf::from("/tmp/missing-repo"));
        assert!(err.to_string().contains("/tmp/missing-repo"));
    }
}
