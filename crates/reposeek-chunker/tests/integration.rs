//! Integration test: walk → parse → chunk on a small on-disk repository.

use std::fs;
use std::path::{Path, PathBuf};

use reposeek_chunker::chunk_repo;
use reposeek_core::{ChunkType, ReposeekConfig, ReposeekError};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(
        root,
        "shop/cart.py",
        r#"class Cart:
    """A shopping cart."""

    def add(self, item):
        self.items.append(item)
        recalc(self)

    def total(self):
        return sum(i.price for i in self.items)


def recalc(cart):
    cart.cache.clear()
"#,
    );
    write(
        root,
        "shop/util.py",
        "def slugify(text):\n    '''Make a URL slug.'''\n    return text.lower().replace(' ', '-')\n",
    );
    write(root, "venv/lib/site.py", "def vendored():\n    pass\n");
    write(root, "docs/conf.py", "project = 'shop'\n");
    write(root, "notes.txt", "def not_python(): pass\n");

    dir
}

#[test]
fn chunks_a_repository_in_path_order() {
    let dir = sample_repo();
    let chunks = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();

    let summary: Vec<(PathBuf, &str, ChunkType)> = chunks
        .iter()
        .map(|c| (c.file_path.clone(), c.name.as_str(), c.chunk_type))
        .collect();
    assert_eq!(
        summary,
        vec![
            (PathBuf::from("shop/cart.py"), "Cart", ChunkType::Class),
            (PathBuf::from("shop/cart.py"), "add", ChunkType::Method),
            (PathBuf::from("shop/cart.py"), "total", ChunkType::Method),
            (PathBuf::from("shop/cart.py"), "recalc", ChunkType::Function),
            (PathBuf::from("shop/util.py"), "slugify", ChunkType::Function),
        ]
    );

    let cart = &chunks[0];
    assert_eq!(cart.docstring.as_deref(), Some("A shopping cart."));
    assert_eq!(cart.content, "class Cart:\n    \"\"\"A shopping cart.\"\"\"\n");
    assert_eq!((cart.start_line, cart.end_line), (1, 9));

    let add = &chunks[1];
    assert_eq!(add.parent_class.as_deref(), Some("Cart"));
    assert_eq!(add.calls, vec!["self.items.append", "recalc"]);

    let total = &chunks[2];
    assert_eq!(total.calls, vec!["sum"]);

    let slugify = &chunks[4];
    assert_eq!(slugify.docstring.as_deref(), Some("Make a URL slug."));
    assert_eq!(
        slugify.calls,
        vec!["text.lower().replace", "text.lower"]
    );
}

#[test]
fn chunk_invariants_hold() {
    let dir = sample_repo();
    let chunks = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    assert!(!chunks.is_empty());

    for chunk in &chunks {
        assert!(!chunk.content.is_empty(), "empty content: {chunk:?}");
        assert!(!chunk.file_path.as_os_str().is_empty());
        assert!(chunk.start_line <= chunk.end_line);
        assert_eq!(
            chunk.parent_class.is_some(),
            chunk.chunk_type == ChunkType::Method,
            "parent_class iff method: {chunk:?}"
        );
        assert!(chunk.calls.len() <= 15);
    }
}

#[test]
fn excluded_directories_never_contribute_chunks() {
    let dir = sample_repo();
    let chunks = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    assert!(chunks
        .iter()
        .all(|c| !c.file_path.starts_with("venv")));
    assert!(chunks.iter().all(|c| c.name != "vendored"));
}

#[test]
fn repeated_passes_are_identical() {
    let dir = sample_repo();
    let first = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    let second = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn repository_without_python_yields_no_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "# nothing here\n");
    let chunks = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    assert!(chunks.is_empty());
}

#[test]
fn missing_root_fails_before_walking() {
    let dir = tempfile::tempdir().unwrap();
    let result = chunk_repo(&dir.path().join("gone"), &ReposeekConfig::default());
    assert!(matches!(result, Err(ReposeekError::FileNotFound(_))));
}

#[test]
fn windows_line_endings_do_not_leak_into_chunks() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "win.py",
        "class A:\r\n    \"\"\"Doc\"\"\"\r\n    def f(self):\r\n        pass\r\n",
    );

    let chunks = chunk_repo(dir.path(), &ReposeekConfig::default()).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "class A:\n    \"\"\"Doc\"\"\"");
    assert_eq!(chunks[0].docstring.as_deref(), Some("Doc"));
    assert_eq!(chunks[1].content, "def f(self):\n        pass");
    assert!(chunks.iter().all(|c| !c.content.contains('\r')));
}
