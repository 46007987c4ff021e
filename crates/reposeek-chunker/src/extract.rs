//! Text extraction helpers: names, docstrings, call references, and the
//! class-header scanner.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::chunk::UNKNOWN_NAME;
use crate::grammar::Grammar;

/// Triple-quote delimiters that open a docstring line.
const DOCSTRING_DELIMITERS: [&str; 2] = ["\"\"\"", "'''"];

/// Line prefixes that start a method definition inside a class body.
const DEF_PREFIXES: [&str; 2] = ["def ", "async def "];

/// Source text covered by `node`, or `""` if the span is out of range.
pub fn node_text<'s>(node: &Node, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Visit `node` and every descendant in depth-first pre-order.
///
/// Uses a tree cursor rather than recursion, so arbitrarily deep
/// expression trees are fine.
pub fn visit<'t>(node: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Collect `select(n)` for every node `n` in the subtree where it is `Some`,
/// in pre-order.
pub fn collect_descendants<'t, T>(
    node: Node<'t>,
    mut select: impl FnMut(Node<'t>) -> Option<T>,
) -> Vec<T> {
    let mut found = Vec::new();
    visit(node, |n| {
        if let Some(item) = select(n) {
            found.push(item);
        }
    });
    found
}

/// The first direct `identifier` child of a definition, or `"unknown"`.
pub fn node_name(node: &Node, source: &str, grammar: &Grammar) -> String {
    let mut cursor = node.walk();
    let name = node
        .children(&mut cursor)
        .find(|child| child.kind() == grammar.identifier_kind)
        .map(|child| node_text(&child, source).to_string());
    name.unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

/// The body block of a definition node.
pub fn body_block<'t>(node: &Node<'t>, grammar: &Grammar) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let body = node
        .children(&mut cursor)
        .find(|child| child.kind() == grammar.body_kind);
    body
}

/// The docstring of a definition: its body's first statement, if that
/// statement is a lone string literal.
///
/// Comments before the first statement are ignored. The literal is cleaned
/// with [`clean_docstring`].
pub fn docstring(node: &Node, source: &str, grammar: &Grammar, max_chars: usize) -> Option<String> {
    let body = body_block(node, grammar)?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|stmt| stmt.kind() != grammar.comment_kind)?;

    if first.kind() != grammar.expression_statement_kind || first.named_child_count() != 1 {
        return None;
    }
    let literal = first.named_child(0)?;
    if literal.kind() != grammar.string_kind {
        return None;
    }

    Some(clean_docstring(node_text(&literal, source), max_chars))
}

/// Strip a string literal's prefix, quotes, and surrounding whitespace,
/// then truncate to `max_chars` characters.
///
/// # Examples
///
/// ```
/// use reposeek_chunker::extract::clean_docstring;
///
/// assert_eq!(clean_docstring("\"\"\"Docs\"\"\"", 300), "Docs");
/// assert_eq!(clean_docstring("r'''\n    Raw docs.\n    '''", 300), "Raw docs.");
/// assert_eq!(clean_docstring("\"abcdef\"", 3), "abc");
/// ```
pub fn clean_docstring(literal: &str, max_chars: usize) -> String {
    literal
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}

/// Distinct callee references in `node`'s subtree, first occurrence first,
/// at most `limit` of them.
///
/// Only bare identifiers (`foo()`) and attribute paths (`self.db.commit()`)
/// are recorded; calls through subscripts or other calls are not.
pub fn calls(node: Node, source: &str, grammar: &Grammar, limit: usize) -> Vec<String> {
    let callees = collect_descendants(node, |n| {
        if n.kind() != grammar.call_kind {
            return None;
        }
        let callee = n
            .child_by_field_name(grammar.callee_field)
            .or_else(|| n.child(0))?;
        if callee.kind() == grammar.identifier_kind || callee.kind() == grammar.attribute_kind {
            Some(node_text(&callee, source))
        } else {
            None
        }
    });

    let mut seen = HashSet::new();
    callees
        .into_iter()
        .filter(|callee| seen.insert(*callee))
        .take(limit)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    Scanning,
    InDocstring { delimiter: &'static str },
}

/// Header of a class: its source lines up to, not including, the first
/// method definition outside a docstring.
///
/// Lines keep their original indentation. Decorators, base-class lists,
/// class attributes, comments, and triple-quoted blocks before the first
/// method are part of the header.
///
/// # Examples
///
/// ```
/// use reposeek_chunker::extract::class_header;
///
/// let class = "class Foo(Base):\n    \"\"\"Docs\"\"\"\n    x = 1\n    def bar(self):\n        pass";
/// assert_eq!(class_header(class), "class Foo(Base):\n    \"\"\"Docs\"\"\"\n    x = 1");
/// ```
pub fn class_header(class_text: &str) -> String {
    let mut header = Vec::new();
    let mut state = HeaderState::Scanning;

    for line in class_text.split('\n') {
        let stripped = line.trim();

        match state {
            HeaderState::Scanning => {
                let opening = DOCSTRING_DELIMITERS
                    .into_iter()
                    .find(|d| stripped.starts_with(d));
                if let Some(delimiter) = opening {
                    header.push(line);
                    // A one-line docstring opens and closes on the same line
                    if stripped.matches(delimiter).count() < 2 {
                        state = HeaderState::InDocstring { delimiter };
                    }
                } else if DEF_PREFIXES.iter().any(|p| stripped.starts_with(p)) {
                    break;
                } else {
                    header.push(line);
                }
            }
            HeaderState::InDocstring { delimiter } => {
                header.push(line);
                if stripped.contains(delimiter) {
                    state = HeaderState::Scanning;
                }
            }
        }
    }

    header.join("\n")
}
