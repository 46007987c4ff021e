//! Syntax-tree chunking.
//!
//! Walks a tree-sitter tree and emits one [`CodeChunk`] per function,
//! method, and class, in depth-first pre-order. A class's own chunk comes
//! before the chunks of its methods.

use std::path::Path;
use std::rc::Rc;

use reposeek_core::{ChunkType, ChunkerConfig, ReposeekError, Result};
use tree_sitter::{Node, Parser};

use crate::chunk::CodeChunk;
use crate::extract::{body_block, calls, class_header, docstring, node_name, node_text};
use crate::grammar::Grammar;
use crate::walker::Language;

/// Parses files of one language and splits them into chunks.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reposeek_chunker::chunker::Chunker;
/// use reposeek_chunker::walker::Language;
///
/// let mut chunker = Chunker::new(Language::Python).unwrap();
/// let chunks = chunker
///     .chunk_file(Path::new("hello.py"), "def hello():\n    print('hi')\n")
///     .unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].name, "hello");
/// assert_eq!(chunks[0].calls, vec!["print"]);
/// ```
pub struct Chunker {
    parser: Parser,
    language: Language,
    grammar: &'static Grammar,
    config: ChunkerConfig,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("language", &self.language)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Chunker {
    /// Create a chunker with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Parse`] if `language` has no grammar or the
    /// grammar cannot be loaded.
    pub fn new(language: Language) -> Result<Self> {
        Self::with_config(language, ChunkerConfig::default())
    }

    /// Create a chunker with explicit limits.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Parse`] if `language` has no grammar or the
    /// grammar cannot be loaded.
    pub fn with_config(language: Language, config: ChunkerConfig) -> Result<Self> {
        let (Some(ts_language), Some(grammar)) =
            (language.tree_sitter_language(), language.grammar())
        else {
            return Err(ReposeekError::Parse(format!(
                "no grammar available for {language}"
            )));
        };

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ReposeekError::Parse(format!("failed to set language: {e}")))?;

        Ok(Self {
            parser,
            language,
            grammar,
            config,
        })
    }

    /// Language this chunker parses.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Split one file into chunks.
    ///
    /// `path` is recorded on every chunk as given; pass it relative to the
    /// repository root. Syntax errors do not fail the file: tree-sitter
    /// recovers and whatever definitions it finds are chunked.
    ///
    /// # Errors
    ///
    /// Returns [`ReposeekError::Parse`] if the parser produces no tree.
    pub fn chunk_file(&mut self, path: &Path, content: &str) -> Result<Vec<CodeChunk>> {
        let tree = self.parser.parse(content, None).ok_or_else(|| {
            ReposeekError::Parse(format!("no syntax tree produced for {}", path.display()))
        })?;

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("{} has syntax errors, chunking what parsed", path.display());
        }

        let traversal = Traversal {
            source: content,
            file_path: path,
            grammar: self.grammar,
            config: &self.config,
        };
        Ok(traversal.walk(root))
    }
}

/// Per-file state shared by every step of one traversal.
struct Traversal<'a> {
    source: &'a str,
    file_path: &'a Path,
    grammar: &'static Grammar,
    config: &'a ChunkerConfig,
}

impl Traversal<'_> {
    /// Pre-order walk with an explicit stack, so nesting depth is bounded
    /// by memory rather than the call stack. Each entry carries the name of
    /// the class whose body it sits directly in.
    fn walk(&self, root: Node) -> Vec<CodeChunk> {
        let mut chunks = Vec::new();
        let mut stack: Vec<(Node, Option<Rc<str>>)> = vec![(root, None)];

        while let Some((node, class_name)) = stack.pop() {
            let kind = node.kind();

            if self.grammar.is_function(kind) {
                // Nested functions belong to this chunk's content, not their own
                chunks.push(self.function_chunk(node, class_name.as_deref()));
                continue;
            }

            if kind == self.grammar.class_kind {
                let name: Rc<str> = node_name(&node, self.source, self.grammar).into();
                chunks.push(self.class_chunk(node, &name));
                if let Some(body) = body_block(&node, self.grammar) {
                    push_children(&mut stack, body, Some(name));
                }
                continue;
            }

            push_children(&mut stack, node, class_name);
        }

        chunks
    }

    fn function_chunk(&self, node: Node, class_name: Option<&str>) -> CodeChunk {
        let chunk_type = if class_name.is_some() {
            ChunkType::Method
        } else {
            ChunkType::Function
        };

        CodeChunk {
            content: node_text(&node, self.source).to_string(),
            chunk_type,
            file_path: self.file_path.to_path_buf(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
            name: node_name(&node, self.source, self.grammar),
            parent_class: class_name.map(str::to_string),
            docstring: docstring(
                &node,
                self.source,
                self.grammar,
                self.config.max_docstring_chars,
            ),
            calls: calls(node, self.source, self.grammar, self.config.max_calls),
        }
    }

    fn class_chunk(&self, node: Node, name: &str) -> CodeChunk {
        CodeChunk {
            content: class_header(node_text(&node, self.source)),
            chunk_type: ChunkType::Class,
            file_path: self.file_path.to_path_buf(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
            name: name.to_string(),
            parent_class: None,
            docstring: docstring(
                &node,
                self.source,
                self.grammar,
                self.config.max_docstring_chars,
            ),
            calls: Vec::new(),
        }
    }
}

/// Push `node`'s children so the first child is popped first.
fn push_children<'t>(
    stack: &mut Vec<(Node<'t>, Option<Rc<str>>)>,
    node: Node<'t>,
    class_name: Option<Rc<str>>,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    stack.extend(
        children
            .into_iter()
            .rev()
            .map(|child| (child, class_name.clone())),
    );
}
