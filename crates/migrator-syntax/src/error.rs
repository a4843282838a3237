//! Error types for parsing and patching operations.

use thiserror::Error;

use crate::position::{Position, TextRange};

/// Errors raised while preparing or running the Python parser.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyntaxError {
    /// Failed to initialise the Tree-sitter parser.
    #[error("failed to initialise python parser: {message}")]
    ParserInitError {
        /// Description of the failure.
        message: String,
    },

    /// Tree-sitter did not produce a syntax tree.
    #[error("failed to parse python source: {message}")]
    ParseError {
        /// Description of the failure.
        message: String,
    },
}

impl SyntaxError {
    /// Creates a parser initialisation error.
    #[must_use]
    pub fn parser_init(message: impl Into<String>) -> Self {
        Self::ParserInitError {
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }
}

/// Errors raised while applying edit spans to a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PatchError {
    /// A span references a line or column that does not exist in the buffer.
    #[error("invalid position: line {}, column {}", position.line, position.column)]
    InvalidPosition {
        /// The offending zero-based position.
        position: Position,
    },

    /// A span ends before it starts.
    #[error(
        "inverted span: {}:{} precedes {}:{}",
        range.end.line,
        range.end.column,
        range.start.line,
        range.start.column
    )]
    InvertedRange {
        /// The offending range.
        range: TextRange,
    },

    /// Two spans cover overlapping parts of the buffer.
    #[error(
        "overlapping spans at {}:{} and {}:{}",
        first.start.line,
        first.start.column,
        second.start.line,
        second.start.column
    )]
    Overlap {
        /// The earlier span in document order.
        first: TextRange,
        /// The span that intrudes into `first`.
        second: TextRange,
    },
}
