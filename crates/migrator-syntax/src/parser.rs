//! Tree-sitter parsing wrapper with error recovery.
//!
//! Tree-sitter is error tolerant: it always produces a tree, marking the
//! portions it could not parse with ERROR or MISSING nodes. Structural
//! rewriters refuse to patch a file whose tree contains such nodes, so the
//! wrapper exposes both the tree and a summary of the errors it holds.

use std::ops::Range;

use crate::error::SyntaxError;
use crate::position::Position;

/// Result of parsing Python source code.
#[derive(Debug)]
pub struct ParseResult {
    tree: tree_sitter::Tree,
    source: String,
}

impl ParseResult {
    /// Returns the parsed syntax tree.
    #[must_use]
    pub const fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    /// Returns the source code that was parsed.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the root node of the syntax tree.
    #[must_use]
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Returns whether the tree contains ERROR or MISSING nodes.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Collects every syntax error found in the tree.
    #[must_use]
    pub fn errors(&self) -> Vec<SyntaxErrorInfo> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), &self.source, &mut errors);
        errors
    }

    /// Returns the first syntax error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<SyntaxErrorInfo> {
        self.errors().into_iter().next()
    }
}

/// Information about a syntax error found during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrorInfo {
    /// Byte range of the error in the source.
    pub byte_range: Range<usize>,
    /// Line number (one-based) where the error starts.
    pub line: u32,
    /// Column number (one-based) where the error starts.
    pub column: u32,
    /// Human-readable description of the error.
    pub message: String,
}

impl SyntaxErrorInfo {
    fn from_node(node: tree_sitter::Node<'_>, source: &str) -> Self {
        let start = Position::from_point(node.start_position());
        let byte_range = node.byte_range();
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            let snippet: String = source
                .get(byte_range.clone())
                .unwrap_or_default()
                .chars()
                .take(40)
                .collect();
            format!("unexpected `{}`", snippet.trim())
        };

        Self {
            byte_range,
            line: start.line.saturating_add(1),
            column: start.column.saturating_add(1),
            message,
        }
    }
}

/// Tree-sitter parser configured for Python.
pub struct Parser {
    inner: tree_sitter::Parser,
}

impl Parser {
    /// Creates a parser for Python sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the grammar cannot be loaded, which happens when
    /// the grammar and runtime ABI versions disagree.
    pub fn python() -> Result<Self, SyntaxError> {
        let mut inner = tree_sitter::Parser::new();
        inner
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| SyntaxError::parser_init(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parses source code and returns the result.
    ///
    /// # Errors
    ///
    /// Returns an error if Tree-sitter fails to produce a tree at all.
    pub fn parse(&mut self, source: &str) -> Result<ParseResult, SyntaxError> {
        let tree = self
            .inner
            .parse(source, None)
            .ok_or_else(|| SyntaxError::parse("parsing failed"))?;

        Ok(ParseResult {
            tree,
            source: source.to_owned(),
        })
    }
}

fn collect_error_nodes(
    node: tree_sitter::Node<'_>,
    source: &str,
    errors: &mut Vec<SyntaxErrorInfo>,
) {
    if node.is_error() || node.is_missing() {
        errors.push(SyntaxErrorInfo::from_node(node, source));
        return;
    }
    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, source, errors);
    }
}
