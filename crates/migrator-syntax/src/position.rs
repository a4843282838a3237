//! Position conversion helpers.
//!
//! Positions are zero-based lines and zero-based UTF-8 byte columns, the same
//! convention Tree-sitter uses for its points. Both LF and CRLF line endings
//! are recognised.

/// A position within a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Line number (zero-based).
    pub line: u32,
    /// Column offset (zero-based, UTF-8 bytes).
    pub column: u32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Converts a Tree-sitter point into a position.
    #[must_use]
    pub fn from_point(point: tree_sitter::Point) -> Self {
        // Line/column numbers will realistically never exceed u32::MAX.
        let line = u32::try_from(point.row).unwrap_or(u32::MAX);
        let column = u32::try_from(point.column).unwrap_or(u32::MAX);
        Self { line, column }
    }
}

/// A range within a text buffer, defined by start and end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextRange {
    /// Start of the range (inclusive).
    pub start: Position,
    /// End of the range (exclusive).
    pub end: Position,
}

impl TextRange {
    /// Creates a new range from start to end.
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Creates a zero-length range at the given position.
    #[must_use]
    pub const fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Returns the range covered by a syntax node.
    #[must_use]
    pub fn of_node(node: tree_sitter::Node<'_>) -> Self {
        Self::new(
            Position::from_point(node.start_position()),
            Position::from_point(node.end_position()),
        )
    }
}

/// Line start table for a borrowed text buffer.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Indexes the line starts of `text`.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { text, line_starts }
    }

    /// Returns the indexed text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Converts a position to a byte offset.
    ///
    /// Returns `None` when the line does not exist, when the column lies past
    /// the end of the line's content (newline excluded), or when the offset
    /// falls inside a multi-byte character.
    #[must_use]
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line_idx = usize::try_from(position.line).ok()?;
        let column = usize::try_from(position.column).ok()?;
        let line_start = *self.line_starts.get(line_idx)?;
        let line_end = self
            .line_starts
            .get(line_idx + 1)
            .copied()
            .unwrap_or(self.text.len());

        // A carriage return stays addressable so byte ranges produced by regex
        // matches over CRLF text round-trip through positions.
        let bytes = self.text.as_bytes();
        let content_end = if line_end > line_start && bytes.get(line_end - 1) == Some(&b'\n') {
            line_end - 1
        } else {
            line_end
        };

        if column > content_end.saturating_sub(line_start) {
            return None;
        }

        let offset = line_start.checked_add(column)?;
        self.text.is_char_boundary(offset).then_some(offset)
    }

    /// Converts a byte offset to a position.
    ///
    /// Offsets past the end of the buffer clamp to the end.
    #[must_use]
    pub fn position(&self, offset: usize) -> Position {
        let clamped = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&clamped) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line_idx).copied().unwrap_or(0);
        let line = u32::try_from(line_idx).unwrap_or(u32::MAX);
        let column = u32::try_from(clamped - line_start).unwrap_or(u32::MAX);
        Position::new(line, column)
    }

    /// Converts a byte range to a [`TextRange`].
    #[must_use]
    pub fn range(&self, bytes: std::ops::Range<usize>) -> TextRange {
        TextRange::new(self.position(bytes.start), self.position(bytes.end))
    }
}
