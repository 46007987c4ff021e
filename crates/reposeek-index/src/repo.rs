//! Where the code comes from: a local directory or a shallow clone of a
//! remote repository.

use std::path::{Path, PathBuf};
use std::process::Command;

use reposeek_core::{ReposeekError, Result};
use tempfile::TempDir;

const REMOTE_PREFIXES: [&str; 4] = ["http://", "https://", "git@", "ssh://"];

/// A repository to index.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use reposeek_index::repo::RepoSource;
///
/// assert_eq!(
///     RepoSource::parse("https://github.com/psf/requests"),
///     RepoSource::Remote("https://github.com/psf/requests".into())
/// );
/// assert_eq!(RepoSource::parse("./src"), RepoSource::Local(PathBuf::from("./src")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    /// A git URL to clone.
    Remote(String),
    /// A directory already on disk.
    Local(PathBuf),
}

impl RepoSource {
    /// Classify user input as a remote URL or a local path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if REMOTE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            RepoSource::Remote(trimmed.to_string())
        } else {
            RepoSource::Local(PathBuf::from(trimmed))
        }
    }
}

/// Trim, drop trailing slashes, and make sure the URL ends in `.git`.
///
/// # Examples
///
/// ```
/// use reposeek_index::repo::normalize_url;
///
/// assert_eq!(normalize_url("https://github.com/a/b/"), "https://github.com/a/b.git");
/// assert_eq!(normalize_url("git@github.com:a/b.git"), "git@github.com:a/b.git");
/// ```
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.ends_with(".git") {
        url.to_string()
    } else {
        format!("{url}.git")
    }
}

/// A shallow clone in a temporary directory, deleted on drop.
#[derive(Debug)]
pub struct ClonedRepo {
    dir: TempDir,
    url: String,
}

impl ClonedRepo {
    /// Root of the working tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The normalized URL that was cloned.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Shallow-clone `url` (depth 1) into a fresh temporary directory.
///
/// # Errors
///
/// Returns [`ReposeekError::Git`] if `git` cannot be run or the clone
/// fails, and [`ReposeekError::Io`] if the temporary directory cannot be
/// created.
pub fn clone_repo(url: &str) -> Result<ClonedRepo> {
    let url = normalize_url(url);
    let dir = tempfile::Builder::new().prefix("reposeek-").tempdir()?;

    tracing::info!("cloning {url} into {}", dir.path().display());

    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", &url])
        .arg(dir.path())
        .output()
        .map_err(|e| ReposeekError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReposeekError::Git(format!(
            "git clone {url} failed: {}",
            stderr.trim()
        )));
    }

    Ok(ClonedRepo { dir, url })
}
