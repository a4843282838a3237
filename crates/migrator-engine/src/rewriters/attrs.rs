//! Converts `attrs` and `states` view attributes into 17.0 expressions.
//!
//! `attrs="{'invisible': [('state', '=', 'done')]}"` becomes
//! `invisible="state == 'done'"`. Domains are read in prefix notation with
//! an implicit `&` between top-level terms; `states="a,b"` becomes an
//! `invisible` condition on `state`, joined with any `invisible` domain by
//! `or`. Elements whose domain uses an operator without a Python
//! counterpart are left alone and reported.

use std::ops::Range;

use indexmap::IndexMap;
use migrator_rules::ScopeSpec;
use migrator_syntax::python::{node_text, python_repr, string_node_value};
use migrator_syntax::{EditSpan, LineIndex, Parser, Patcher};
use regex::Regex;
use tree_sitter::Node;

use super::{RewriteContext, Rewriter, compile};
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::EngineError;

const UNCONVERTED: &str =
    "Could not convert an 'attrs' or 'states' attribute; convert it by hand";
const ALREADY_SET: &str =
    "Kept 'attrs' or 'states' on an element that already sets the converted attribute";
const INHERITED: &str =
    "'attrs' or 'states' changed through <attribute> must be converted by hand";

/// The view attribute rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct AttrsToExpressions;

impl Rewriter for AttrsToExpressions {
    fn name(&self) -> &'static str {
        "attrs_to_expressions"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("16.0", "17.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let patterns = TagPatterns::new()?;
        let mut parser = Parser::python()?;
        for file in context.files(&[".xml"])? {
            let original = match context.io().read(&file) {
                Ok(text) => text,
                Err(EngineError::NotUtf8 { .. }) => continue,
                Err(error) => return Err(error),
            };
            if !original.contains("attrs") && !original.contains("states") {
                continue;
            }
            let mut findings = Vec::new();
            let edits = patterns.edits(&mut parser, &original, &mut findings);
            let relative = context.module().relative(&file);
            for finding in findings {
                context.record(finding.in_file(&relative));
            }
            if edits.is_empty() {
                continue;
            }
            let updated = Patcher::apply(&original, &edits)?;
            if context.io().write_if_changed(&file, &original, &updated)? {
                context.log_rewrite(self.name(), &file);
            }
        }
        Ok(())
    }
}

struct TagPatterns {
    tag: Regex,
    attribute: Regex,
    inherited: Regex,
}

/// One `name="value"` pair of a start tag.
struct TagAttribute<'a> {
    name: &'a str,
    value: String,
    /// Byte range within the tag, leading whitespace included.
    range: Range<usize>,
}

impl TagPatterns {
    fn new() -> Result<Self, EngineError> {
        Ok(Self {
            tag: compile(r#"<[\w.:-]+(?:\s+[\w.:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*\s*/?>"#)?,
            attribute: compile(r#"\s+([\w.:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            inherited: compile(r#"<attribute\s+name=["'](?:attrs|states)["']"#)?,
        })
    }

    fn edits(
        &self,
        parser: &mut Parser,
        source: &str,
        findings: &mut Vec<Diagnostic>,
    ) -> Vec<EditSpan> {
        if self.inherited.is_match(source) {
            findings.push(Diagnostic::new(Severity::Warning, INHERITED));
        }
        let index = LineIndex::new(source);
        self.tag
            .find_iter(source)
            .filter_map(|tag| {
                let rebuilt = self.convert_tag(parser, tag.as_str(), findings)?;
                let range = index.range(tag.range());
                Some(EditSpan::replace(range.start, range.end, rebuilt))
            })
            .collect()
    }

    fn attributes<'a>(&self, tag: &'a str) -> Vec<TagAttribute<'a>> {
        self.attribute
            .captures_iter(tag)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let name = captures.get(1)?.as_str();
                let value = captures.get(2).or_else(|| captures.get(3))?.as_str();
                Some(TagAttribute {
                    name,
                    value: xml_unescape(value),
                    range: whole.range(),
                })
            })
            .collect()
    }

    /// Rebuilds `tag` with its `attrs` and `states` converted.
    fn convert_tag(
        &self,
        parser: &mut Parser,
        tag: &str,
        findings: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        let attributes = self.attributes(tag);
        let attrs = attributes.iter().find(|attribute| attribute.name == "attrs");
        let states = attributes.iter().find(|attribute| attribute.name == "states");
        if attrs.is_none() && states.is_none() {
            return None;
        }

        let mut conditions = IndexMap::new();
        if let Some(attribute) = attrs {
            let Some(converted) = attrs_conditions(parser, &attribute.value) else {
                findings.push(Diagnostic::new(Severity::Warning, UNCONVERTED));
                return None;
            };
            conditions = converted;
        }
        if let Some(attribute) = states {
            let Some(hidden) = states_condition(&attribute.value) else {
                findings.push(Diagnostic::new(Severity::Warning, UNCONVERTED));
                return None;
            };
            let invisible = match conditions.shift_remove("invisible") {
                Some(existing) => Expr::Or(Box::new(hidden), Box::new(existing)),
                None => hidden,
            };
            conditions.insert("invisible".to_owned(), invisible);
        }
        if conditions
            .keys()
            .any(|key| attributes.iter().any(|attribute| attribute.name == key))
        {
            findings.push(Diagnostic::new(Severity::Warning, ALREADY_SET));
            return None;
        }

        let replacement: String = conditions
            .iter()
            .map(|(name, condition)| format!(" {name}=\"{}\"", xml_escape(&condition.render())))
            .collect();
        let mut removed: Vec<&Range<usize>> = [attrs, states]
            .into_iter()
            .flatten()
            .map(|attribute| &attribute.range)
            .collect();
        removed.sort_by_key(|range| range.start);

        let mut rebuilt = String::with_capacity(tag.len() + replacement.len());
        let mut cursor = 0;
        for (position, range) in removed.iter().enumerate() {
            rebuilt.push_str(tag.get(cursor..range.start)?);
            if position == 0 {
                rebuilt.push_str(&replacement);
            }
            cursor = range.end;
        }
        rebuilt.push_str(tag.get(cursor..)?);
        Some(rebuilt)
    }
}

/// A Python boolean expression under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    /// A bare name.
    Term(String),
    /// A comparison such as `state == 'done'`.
    Compare(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    const fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 1,
            Self::And(..) => 2,
            Self::Not(_) => 3,
            Self::Compare(_) => 4,
            Self::Term(_) => 5,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Term(text) | Self::Compare(text) => text.clone(),
            Self::Not(inner) => format!("not {}", inner.wrapped(5)),
            Self::And(left, right) => format!("{} and {}", left.wrapped(2), right.wrapped(2)),
            Self::Or(left, right) => format!("{} or {}", left.wrapped(1), right.wrapped(1)),
        }
    }

    fn wrapped(&self, minimum: u8) -> String {
        if self.precedence() < minimum {
            format!("({})", self.render())
        } else {
            self.render()
        }
    }
}

enum Token {
    And,
    Or,
    Not,
    Leaf(Expr),
}

/// Reads an `attrs` dictionary into one condition per attribute.
fn attrs_conditions(parser: &mut Parser, value: &str) -> Option<IndexMap<String, Expr>> {
    let parsed = parser.parse(&format!("({})", value.trim())).ok()?;
    if parsed.has_errors() {
        return None;
    }
    let source = parsed.source();
    let dictionary = parsed
        .root_node()
        .named_child(0)?
        .named_child(0)?
        .named_child(0)?;
    if dictionary.kind() != "dictionary" {
        return None;
    }

    let mut conditions = IndexMap::new();
    let mut cursor = dictionary.walk();
    for pair in dictionary.named_children(&mut cursor) {
        if pair.kind() == "comment" {
            continue;
        }
        if pair.kind() != "pair" {
            return None;
        }
        let key = string_node_value(pair.child_by_field_name("key")?, source)?;
        let condition = domain(pair.child_by_field_name("value")?, source)?;
        conditions.insert(key, condition);
    }
    Some(conditions)
}

/// Converts a prefix-notation domain.
fn domain(node: Node<'_>, source: &str) -> Option<Expr> {
    if !matches!(node.kind(), "list" | "tuple") {
        return None;
    }
    let mut cursor = node.walk();
    let tokens = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| token(child, source))
        .collect::<Option<Vec<Token>>>()?;

    let mut remaining = tokens.into_iter().peekable();
    let mut condition = term(&mut remaining)?;
    while remaining.peek().is_some() {
        let next = term(&mut remaining)?;
        condition = Expr::And(Box::new(condition), Box::new(next));
    }
    Some(condition)
}

fn term(tokens: &mut impl Iterator<Item = Token>) -> Option<Expr> {
    match tokens.next()? {
        Token::And => {
            let left = term(tokens)?;
            let right = term(tokens)?;
            Some(Expr::And(Box::new(left), Box::new(right)))
        }
        Token::Or => {
            let left = term(tokens)?;
            let right = term(tokens)?;
            Some(Expr::Or(Box::new(left), Box::new(right)))
        }
        Token::Not => Some(Expr::Not(Box::new(term(tokens)?))),
        Token::Leaf(condition) => Some(condition),
    }
}

fn token(node: Node<'_>, source: &str) -> Option<Token> {
    if matches!(node.kind(), "string" | "concatenated_string") {
        return match string_node_value(node, source)?.as_str() {
            "&" => Some(Token::And),
            "|" => Some(Token::Or),
            "!" => Some(Token::Not),
            _ => None,
        };
    }
    if !matches!(node.kind(), "list" | "tuple") {
        return None;
    }
    let mut cursor = node.walk();
    let parts: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    let [field, operator, value] = parts.as_slice() else {
        return None;
    };
    let field_name = string_node_value(*field, source)?;
    let operator_name = string_node_value(*operator, source)?;
    leaf(&field_name, &operator_name, node_text(*value, source)).map(Token::Leaf)
}

fn leaf(field: &str, operator: &str, value: &str) -> Option<Expr> {
    let compare = |symbol: &str| Expr::Compare(format!("{field} {symbol} {value}"));
    let condition = match (operator, value) {
        ("=" | "==", "False") | ("!=" | "<>", "True") => {
            Expr::Not(Box::new(Expr::Term(field.to_owned())))
        }
        ("=" | "==", "True") | ("!=" | "<>", "False") => Expr::Term(field.to_owned()),
        ("=" | "==", _) => compare("=="),
        ("!=" | "<>", _) => compare("!="),
        ("<" | ">" | "<=" | ">=" | "in" | "not in", _) => compare(operator),
        _ => return None,
    };
    Some(condition)
}

/// `states="draft,sent"` hides the element outside those states.
fn states_condition(value: &str) -> Option<Expr> {
    let states: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|state| !state.is_empty())
        .map(python_repr)
        .collect();
    match states.as_slice() {
        [] => None,
        [single] => Some(Expr::Compare(format!("state != {single}"))),
        many => Some(Expr::Compare(format!(
            "state not in ({})",
            many.join(", ")
        ))),
    }
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
