//! Syntax-aware editing primitives for the module migrator.
//!
//! This crate provides the leaf layer of the structural rewriting pipeline:
//!
//! - **Parsing**: a Tree-sitter wrapper for Python sources with error
//!   detection ([`Parser`], [`ParseResult`]).
//! - **Positions**: conversion between byte offsets and zero-based line and
//!   column coordinates ([`Position`], [`LineIndex`]).
//! - **Edit spans**: position-addressed replacements whose payload is either
//!   literal text or a copy of another range of the original source
//!   ([`EditSpan`], [`SpanPayload`]).
//! - **Patching**: validated, reverse-order application of non-overlapping
//!   spans onto a text buffer ([`Patcher`]).
//! - **Python helpers**: call-site discovery, argument classification and
//!   string literal evaluation used by the structural rewriters
//!   ([`python`]).
//!
//! # Example
//!
//! ```ignore
//! use migrator_syntax::{EditSpan, Patcher, Position};
//!
//! let spans = vec![EditSpan::replace(
//!     Position::new(0, 0),
//!     Position::new(0, 3),
//!     "bar",
//! )];
//! let patched = Patcher::apply("foo()", &spans)?;
//! assert_eq!(patched, "bar()");
//! ```

mod error;
mod parser;
mod patcher;
mod position;
pub mod python;
mod span;

pub use error::{PatchError, SyntaxError};
pub use parser::{ParseResult, Parser, SyntaxErrorInfo};
pub use patcher::Patcher;
pub use position::{LineIndex, Position, TextRange};
pub use span::{EditSpan, SpanPayload};

#[cfg(test)]
mod tests;
