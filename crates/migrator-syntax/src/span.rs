//! Position-addressed replacements produced by structural rewriters.

use crate::position::{Position, TextRange};

/// What a span writes in place of the range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanPayload {
    /// Literal replacement text.
    Literal(String),
    /// The original text found at another range of the same buffer.
    ///
    /// Copies are resolved against the unpatched source, so two spans that
    /// copy each other's ranges swap the two fragments.
    Source(TextRange),
}

/// A single replacement addressed by zero-based lines and byte columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSpan {
    range: TextRange,
    payload: SpanPayload,
}

impl EditSpan {
    /// Builds a span from a range and payload.
    #[must_use]
    pub const fn new(range: TextRange, payload: SpanPayload) -> Self {
        Self { range, payload }
    }

    /// Replaces the text between `start` and `end` with literal text.
    #[must_use]
    pub fn replace(start: Position, end: Position, text: impl Into<String>) -> Self {
        Self::new(TextRange::new(start, end), SpanPayload::Literal(text.into()))
    }

    /// Inserts literal text at `position`.
    #[must_use]
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self::new(TextRange::point(position), SpanPayload::Literal(text.into()))
    }

    /// Deletes the text between `start` and `end`.
    #[must_use]
    pub const fn delete(start: Position, end: Position) -> Self {
        Self::new(
            TextRange::new(start, end),
            SpanPayload::Literal(String::new()),
        )
    }

    /// Replaces `range` with a copy of the original text at `source`.
    #[must_use]
    pub const fn copy(range: TextRange, source: TextRange) -> Self {
        Self::new(range, SpanPayload::Source(source))
    }

    /// Replaces the text covered by `node` with literal text.
    #[must_use]
    pub fn replace_node(node: tree_sitter::Node<'_>, text: impl Into<String>) -> Self {
        Self::new(TextRange::of_node(node), SpanPayload::Literal(text.into()))
    }

    /// Replaces the text covered by `target` with the original text of
    /// `source`.
    #[must_use]
    pub fn copy_node(target: tree_sitter::Node<'_>, source: tree_sitter::Node<'_>) -> Self {
        Self::copy(TextRange::of_node(target), TextRange::of_node(source))
    }

    /// Range covered by the span.
    #[must_use]
    pub const fn range(&self) -> TextRange {
        self.range
    }

    /// First line covered (zero-based).
    #[must_use]
    pub const fn line_start(&self) -> u32 {
        self.range.start.line
    }

    /// Last line covered (zero-based).
    #[must_use]
    pub const fn line_end(&self) -> u32 {
        self.range.end.line
    }

    /// Starting column (zero-based, UTF-8 bytes).
    #[must_use]
    pub const fn col_start(&self) -> u32 {
        self.range.start.column
    }

    /// Ending column (zero-based, UTF-8 bytes).
    #[must_use]
    pub const fn col_end(&self) -> u32 {
        self.range.end.column
    }

    /// Replacement payload.
    #[must_use]
    pub const fn payload(&self) -> &SpanPayload {
        &self.payload
    }
}
