//! Edit span application.
//!
//! Spans are resolved to byte offsets against the original buffer, checked
//! for overlap, then applied from the end of the buffer towards the start so
//! that earlier offsets stay valid while later text grows or shrinks.

use std::ops::Range;

use crate::error::PatchError;
use crate::position::{LineIndex, Position, TextRange};
use crate::span::{EditSpan, SpanPayload};

/// Applies sets of [`EditSpan`]s to text buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Patcher;

/// A span resolved to byte offsets and concrete replacement text.
#[derive(Debug)]
struct ResolvedSpan<'s> {
    bytes: Range<usize>,
    range: TextRange,
    text: &'s str,
}

impl Patcher {
    /// Applies `spans` to `source` and returns the patched text.
    ///
    /// Zero-width spans insert text. Adjacent spans are accepted; spans that
    /// share any byte, or two insertions at the same position, are rejected
    /// because their combined result would depend on application order.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidPosition`] when a span or a copied source
    /// range addresses text outside the buffer, [`PatchError::InvertedRange`]
    /// when a span ends before it starts, and [`PatchError::Overlap`] when
    /// two spans overlap.
    pub fn apply(source: &str, spans: &[EditSpan]) -> Result<String, PatchError> {
        let index = LineIndex::new(source);
        let mut resolved = spans
            .iter()
            .map(|span| resolve(&index, span))
            .collect::<Result<Vec<_>, _>>()?;

        resolved.sort_by(|a, b| {
            a.bytes
                .start
                .cmp(&b.bytes.start)
                .then_with(|| a.bytes.end.cmp(&b.bytes.end))
        });
        check_disjoint(&resolved)?;

        let mut result = source.to_owned();
        for span in resolved.iter().rev() {
            result.replace_range(span.bytes.clone(), span.text);
        }
        Ok(result)
    }
}

fn resolve<'s>(index: &LineIndex<'s>, span: &'s EditSpan) -> Result<ResolvedSpan<'s>, PatchError> {
    let range = span.range();
    let bytes = byte_range(index, range)?;
    let text = match span.payload() {
        SpanPayload::Literal(text) => text.as_str(),
        SpanPayload::Source(copied) => {
            let copied_bytes = byte_range(index, *copied)?;
            index
                .text()
                .get(copied_bytes)
                .ok_or(PatchError::InvalidPosition {
                    position: copied.start,
                })?
        }
    };
    Ok(ResolvedSpan { bytes, range, text })
}

fn byte_range(index: &LineIndex<'_>, range: TextRange) -> Result<Range<usize>, PatchError> {
    let start = offset(index, range.start)?;
    let end = offset(index, range.end)?;
    if end < start {
        return Err(PatchError::InvertedRange { range });
    }
    Ok(start..end)
}

fn offset(index: &LineIndex<'_>, position: Position) -> Result<usize, PatchError> {
    index
        .offset(position)
        .ok_or(PatchError::InvalidPosition { position })
}

fn check_disjoint(spans: &[ResolvedSpan<'_>]) -> Result<(), PatchError> {
    for pair in spans.windows(2) {
        let [first, second] = pair else { continue };
        let overlaps = second.bytes.start < first.bytes.end;
        let duplicate_insertion = first.bytes.is_empty()
            && second.bytes.is_empty()
            && first.bytes.start == second.bytes.start;
        if overlaps || duplicate_insertion {
            return Err(PatchError::Overlap {
                first: first.range,
                second: second.range,
            });
        }
    }
    Ok(())
}
