//! Converts `_sql_constraints` lists into `models.Constraint` attributes.

use migrator_rules::ScopeSpec;
use migrator_syntax::python::{double_quoted, node_text, python_repr, string_node_value, walk};
use migrator_syntax::{EditSpan, ParseResult};
use tree_sitter::Node;

use super::{RewriteContext, Rewriter};
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::EngineError;

const FAILED: &str = "Failed to replace sql_constraints";
const INDENT: &str = "    ";

/// Definitions longer than this move to their own line when no message
/// follows them.
const INLINE_LIMIT: usize = 60;

/// The `_sql_constraints` rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlConstraints;

impl Rewriter for SqlConstraints {
    fn name(&self) -> &'static str {
        "sql_constraints"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("18.0", "19.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        context.python_pass(self.name(), "_sql_constraints", constraint_edits)
    }
}

/// One entry of a `_sql_constraints` list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Constraint {
    name: String,
    definition: String,
    message: Option<String>,
}

impl Constraint {
    fn from_node(node: Node<'_>, source: &str) -> Option<Self> {
        if node.kind() != "tuple" {
            return None;
        }
        let mut cursor = node.walk();
        let mut values = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(|child| string_node_value(child, source))
            .collect::<Option<Vec<String>>>()?
            .into_iter();
        let constraint = Self {
            name: values.next()?,
            definition: values.next()?,
            message: values.next(),
        };
        values.next().is_none().then_some(constraint)
    }

    fn render(&self, indent: &str) -> String {
        let inner = format!("{indent}{INDENT}");
        let definition = python_repr(&self.definition);
        let arguments = match &self.message {
            Some(message) => format!(
                "(\n{inner}{definition},\n{inner}{},\n{indent})",
                double_quoted(message)
            ),
            None if self.definition.len() > INLINE_LIMIT => {
                format!("(\n{inner}{definition},\n{indent})")
            }
            None => format!("({definition})"),
        };
        format!("_{} = models.Constraint{arguments}", self.name)
    }
}

fn constraint_edits(parsed: &ParseResult, findings: &mut Vec<Diagnostic>) -> Vec<EditSpan> {
    let source = parsed.source();
    let mut edits = Vec::new();
    walk(parsed.root_node(), &mut |node| {
        let Some(list) = constraint_list(node, source) else {
            return;
        };
        let mut cursor = list.walk();
        let entries = list
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .map(|child| Constraint::from_node(child, source))
            .collect::<Option<Vec<Constraint>>>();
        let Some(constraints) = entries else {
            findings.push(Diagnostic::new(Severity::Warning, FAILED));
            return;
        };
        let indent = " ".repeat(node.start_position().column);
        let rendered = constraints
            .iter()
            .map(|constraint| constraint.render(&indent))
            .collect::<Vec<_>>()
            .join(&format!("\n{indent}"));
        edits.push(EditSpan::replace_node(node, rendered));
    });
    edits
}

/// Returns the list assigned by a `_sql_constraints = [...]` statement.
fn constraint_list<'t>(statement: Node<'t>, source: &str) -> Option<Node<'t>> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let assignment = statement.named_child(0)?;
    if assignment.kind() != "assignment" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    if node_text(left, source) != "_sql_constraints" {
        return None;
    }
    let right = assignment.child_by_field_name("right")?;
    (right.kind() == "list").then_some(right)
}
