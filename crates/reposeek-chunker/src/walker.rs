use std::path::{Component, Path, PathBuf};

use reposeek_core::{ReposeekError, Result, WalkerConfig};

use crate::grammar::{Grammar, PYTHON};

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Path segments that are never walked: version control metadata, virtual
/// environments, dependency directories, caches, and packaging output.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "__pycache__",
    ".git",
    "venv",
    ".venv",
    "env",
    ".env",
    "node_modules",
    ".tox",
    ".pytest_cache",
    "dist",
    "build",
    "egg-info",
];

/// A source file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposeek_chunker::walker::{Language, SourceFile};
///
/// let file = SourceFile {
///     path: PathBuf::from("app/main.py"),
///     language: Language::Python,
///     content: "def main(): pass".to_string(),
/// };
/// assert_eq!(file.language, Language::Python);
/// ```
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// Full file content.
    pub content: String,
}

/// Programming language detected from file extension.
///
/// # Examples
///
/// ```
/// use reposeek_chunker::walker::Language;
///
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_extension("rs"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Unknown,
}

impl Language {
    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Language::Python,
            _ => Language::Unknown,
        }
    }

    /// Lowercase language name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Unknown => "unknown",
        }
    }

    /// Get the tree-sitter language grammar for this language.
    ///
    /// Returns `None` for `Language::Unknown`.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }

    /// Node-kind table the chunker uses for this language.
    pub fn grammar(&self) -> Option<&'static Grammar> {
        match self {
            Language::Python => Some(&PYTHON),
            Language::Unknown => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether any segment of `relative` is in the exclusion set.
///
/// A segment matches when it equals a [`DEFAULT_EXCLUDES`] entry or one of
/// `extra`, or ends in `.egg-info`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reposeek_chunker::walker::is_excluded;
///
/// assert!(is_excluded(Path::new("project/venv/lib/mod.py"), &[]));
/// assert!(is_excluded(Path::new("mypkg.egg-info/PKG-INFO"), &[]));
/// assert!(!is_excluded(Path::new("src/environment.py"), &[]));
/// ```
pub fn is_excluded(relative: &Path, extra: &[String]) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(segment) => {
            let segment = segment.to_string_lossy();
            DEFAULT_EXCLUDES.contains(&segment.as_ref())
                || segment.ends_with(".egg-info")
                || extra.iter().any(|e| *e == segment)
        }
        _ => false,
    })
}

/// Walk a repository, returning the source files the chunker understands.
///
/// Excluded directories are pruned without being descended. Files that are
/// too large, unreadable, not valid UTF-8, binary, or of an unknown language
/// are skipped. Returned paths are relative to `root` and sorted.
///
/// # Errors
///
/// Returns [`ReposeekError::FileNotFound`] if `root` does not exist and
/// [`ReposeekError::Io`] if it cannot be listed. Nothing is walked in
/// either case.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use reposeek_core::WalkerConfig;
/// use reposeek_chunker::walker::walk_repo;
///
/// let files = walk_repo(Path::new("."), &WalkerConfig::default()).unwrap();
/// for f in &files {
///     println!("{}: {}", f.path.display(), f.language);
/// }
/// ```
pub fn walk_repo(root: &Path, config: &WalkerConfig) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        return Err(ReposeekError::FileNotFound(root.to_path_buf()));
    }
    std::fs::read_dir(root)?;

    let prune_root = root.to_path_buf();
    let extra = config.exclude.clone();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(config.respect_gitignore)
        .hidden(false)
        .require_git(false)
        .filter_entry(move |entry| {
            let relative = entry
                .path()
                .strip_prefix(&prune_root)
                .unwrap_or(entry.path());
            !is_excluded(relative, &extra)
        })
        .build();

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!("skipping unreadable entry: {err}");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();

        let language = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => Language::from_extension(ext),
            None => continue,
        };
        if language == Language::Unknown {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!("skipping {}: {err}", path.display());
                continue;
            }
        };
        if metadata.len() > config.max_file_size {
            tracing::debug!("skipping large file: {}", path.display());
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) => {
                tracing::debug!("skipping {}: {err}", path.display());
                continue;
            }
        };

        // Null bytes in the first 8KB mean binary content
        let check_len = content.len().min(BINARY_CHECK_SIZE);
        if content.as_bytes()[..check_len].contains(&0) {
            tracing::debug!("skipping binary file: {}", path.display());
            continue;
        }

        let content = normalize_newlines(content);

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        files.push(SourceFile {
            path: relative,
            language,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("found {} source files under {}", files.len(), root.display());

    Ok(files)
}

/// Rewrite `\r\n` and lone `\r` as `\n`.
fn normalize_newlines(content: String) -> String {
    if content.contains('\r') {
        content.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn walked_paths(root: &Path, config: &WalkerConfig) -> Vec<PathBuf> {
        walk_repo(root, config)
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect()
    }

    #[test]
    fn walk_finds_python_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app.py", b"def main(): pass");
        write(root, "pkg/util.py", b"def helper(): pass");
        write(root, "README.md", b"# Hello");
        write(root, "lib.rs", b"fn main() {}");

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.language == Language::Python));
        assert_eq!(files[0].path, PathBuf::from("app.py"));
        assert_eq!(files[1].path, PathBuf::from("pkg/util.py"));
        assert_eq!(files[1].content, "def helper(): pass");
    }

    #[test]
    fn walk_prunes_excluded_segments() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "project/core.py", b"def ok(): pass");
        write(root, "project/venv/lib/mod.py", b"def hidden(): pass");
        write(root, ".git/hooks/pre_commit.py", b"x = 1");
        write(root, "node_modules/pkg/setup.py", b"x = 1");
        write(root, "src/__pycache__/core.py", b"x = 1");
        write(root, "mypkg.egg-info/setup.py", b"x = 1");
        write(root, "build/lib/core.py", b"x = 1");
        write(root, ".tox/py311/site.py", b"x = 1");

        let paths = walked_paths(root, &WalkerConfig::default());
        assert_eq!(paths, vec![PathBuf::from("project/core.py")]);
    }

    #[test]
    fn walk_visits_hidden_directories_not_in_exclusion_set() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".github/scripts/release.py", b"def release(): pass");
        write(root, ".venv/bin/activate_this.py", b"x = 1");

        let paths = walked_paths(root, &WalkerConfig::default());
        assert_eq!(paths, vec![PathBuf::from(".github/scripts/release.py")]);
    }

    #[test]
    fn walk_applies_configured_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "app/models.py", b"x = 1");
        write(root, "app/migrations/0001_initial.py", b"x = 1");

        let config = WalkerConfig {
            exclude: vec!["migrations".into()],
            ..WalkerConfig::default()
        };
        let paths = walked_paths(root, &config);
        assert_eq!(paths, vec![PathBuf::from("app/models.py")]);
    }

    #[test]
    fn walk_only_honours_gitignore_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".gitignore", b"generated/\n");
        write(root, "generated/schema.py", b"x = 1");
        write(root, "main.py", b"x = 1");

        let all = walked_paths(root, &WalkerConfig::default());
        assert_eq!(all.len(), 2);

        let config = WalkerConfig {
            respect_gitignore: true,
            ..WalkerConfig::default()
        };
        let filtered = walked_paths(root, &config);
        assert_eq!(filtered, vec![PathBuf::from("main.py")]);
    }

    #[test]
    fn walk_skips_unreadable_binary_and_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "latin1.py", &[0x63, 0x61, 0x66, 0xe9, 0xff, 0xfe]);
        write(root, "blob.py", b"x = 1\0\0\0");
        write(root, "huge.py", "x = 1\n".repeat(400).as_bytes());
        write(root, "ok.py", b"def ok(): pass");

        let config = WalkerConfig {
            max_file_size: 1024,
            ..WalkerConfig::default()
        };
        let paths = walked_paths(root, &config);
        assert_eq!(paths, vec![PathBuf::from("ok.py")]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = walk_repo(&missing, &WalkerConfig::default());
        assert!(matches!(result, Err(ReposeekError::FileNotFound(p)) if p == missing));
    }

    #[test]
    fn root_that_is_a_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "single.py", b"x = 1");
        let result = walk_repo(&dir.path().join("single.py"), &WalkerConfig::default());
        assert!(matches!(result, Err(ReposeekError::Io(_))));
    }

    #[test]
    fn line_endings_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "crlf.py",
            b"class A:\r\n    \"\"\"Doc\"\"\"\r\n    def f(self):\r\n        pass\r\n",
        );
        write(dir.path(), "old_mac.py", b"x = 1\ry = 2\r");

        let files = walk_repo(dir.path(), &WalkerConfig::default()).unwrap();
        assert_eq!(
            files[0].content,
            "class A:\n    \"\"\"Doc\"\"\"\n    def f(self):\n        pass\n"
        );
        assert_eq!(files[1].content, "x = 1\ny = 2\n");
    }

    #[test]
    fn exclusion_matches_whole_segments_only() {
        assert!(is_excluded(Path::new("a/build/b.py"), &[]));
        assert!(is_excluded(Path::new(".env/x.py"), &[]));
        assert!(!is_excluded(Path::new("builder/b.py"), &[]));
        assert!(!is_excluded(Path::new("envoy.py"), &[]));
        assert!(is_excluded(Path::new("vendor/x.py"), &["vendor".to_string()]));
    }
}
