//! Node-kind tables that map a tree-sitter grammar onto the chunker's
//! vocabulary (function, class, body, call, ...).

/// Node kinds the chunker and extraction helpers look for in one grammar.
///
/// # Examples
///
/// ```
/// use reposeek_chunker::grammar::PYTHON;
///
/// assert!(PYTHON.is_function("function_definition"));
/// assert!(!PYTHON.is_function("class_definition"));
/// ```
#[derive(Debug)]
pub struct Grammar {
    /// Function-like definitions (emitted as `function` or `method`).
    pub function_kinds: &'static [&'static str],
    /// Class definitions.
    pub class_kind: &'static str,
    /// The statement block holding a definition's body.
    pub body_kind: &'static str,
    /// Plain identifiers, used for names and bare callees.
    pub identifier_kind: &'static str,
    /// Call expressions.
    pub call_kind: &'static str,
    /// Field on a call node that holds the callee.
    pub callee_field: &'static str,
    /// Dotted attribute access (`a.b`).
    pub attribute_kind: &'static str,
    /// Statement wrapping a bare expression.
    pub expression_statement_kind: &'static str,
    /// String literals.
    pub string_kind: &'static str,
    /// Comments, which never count as a body's first statement.
    pub comment_kind: &'static str,
}

impl Grammar {
    /// Whether `kind` is a function-like definition in this grammar.
    pub fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }
}

/// Python, via `tree-sitter-python`. `async def` is also a
/// `function_definition` in this grammar.
pub const PYTHON: Grammar = Grammar {
    function_kinds: &["function_definition"],
    class_kind: "class_definition",
    body_kind: "block",
    identifier_kind: "identifier",
    call_kind: "call",
    callee_field: "function",
    attribute_kind: "attribute",
    expression_statement_kind: "expression_statement",
    string_kind: "string",
    comment_kind: "comment",
};
