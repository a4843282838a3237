//! Reorders `_read_group` arguments for the 17.0 signature.
//!
//! 16.0 takes `(domain, fields, groupby)`; 17.0 takes
//! `(domain, groupby, aggregates)`. Field lists become aggregate
//! specifications: grouped fields are dropped, bare names gain `:sum` and an
//! empty result counts records.

use migrator_rules::ScopeSpec;
use migrator_syntax::python::{
    Argument, CallSite, find_calls, node_text, python_repr, string_node_value, string_sequence,
};
use migrator_syntax::{EditSpan, ParseResult};
use tree_sitter::Node;

use super::{RewriteContext, Rewriter};
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::EngineError;

const REORDERED: &str = "'_read_group' arguments were reordered to (domain, groupby, aggregates). \
                         Check the aggregate specifications.";
const NOT_LITERAL: &str =
    "'_read_group' called with non-literal fields; convert the arguments by hand.";

/// The `_read_group` signature rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadGroupArguments;

impl Rewriter for ReadGroupArguments {
    fn name(&self) -> &'static str {
        "read_group_arguments"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("16.0", "17.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        context.python_pass(self.name(), "_read_group", read_group_edits)
    }
}

fn read_group_edits(parsed: &ParseResult, findings: &mut Vec<Diagnostic>) -> Vec<EditSpan> {
    let source = parsed.source();
    let mut edits = Vec::new();
    for call in find_calls(parsed.root_node(), source, |name| name == "_read_group") {
        if call.has_splat() {
            continue;
        }
        let before = edits.len();
        if let Some(Argument::Keyword { node, value, .. }) = call.keyword("fields", source) {
            keyword_fields(&call, node, value, source, &mut edits, findings);
        } else {
            positional_fields(&call, source, &mut edits, findings);
        }
        if edits.len() > before {
            findings.push(Diagnostic::new(Severity::Warning, REORDERED));
        }
    }
    edits
}

/// `fields=[...]` becomes `aggregates=[...]`.
fn keyword_fields(
    call: &CallSite<'_>,
    argument: Node<'_>,
    value: Node<'_>,
    source: &str,
    edits: &mut Vec<EditSpan>,
    findings: &mut Vec<Diagnostic>,
) {
    let Some(fields) = string_sequence(value, source) else {
        findings.push(Diagnostic::new(Severity::Warning, NOT_LITERAL));
        let text = node_text(value, source);
        edits.push(EditSpan::replace_node(argument, format!("aggregates={text}")));
        return;
    };
    let groupby = groupby_of(call, source).unwrap_or_default();
    edits.push(EditSpan::replace_node(
        argument,
        format!("aggregates={}", render(&aggregates(&fields, &groupby))),
    ));
}

fn positional_fields(
    call: &CallSite<'_>,
    source: &str,
    edits: &mut Vec<EditSpan>,
    findings: &mut Vec<Diagnostic>,
) {
    let Some(second) = call.positional(1) else {
        return;
    };
    let third = call.positional(2);
    if third
        .and_then(|node| string_sequence(node, source))
        .is_some_and(|values| looks_like_aggregates(&values))
    {
        return;
    }
    let Some(fields) = string_sequence(second, source) else {
        findings.push(Diagnostic::new(Severity::Warning, NOT_LITERAL));
        return;
    };

    match third {
        Some(groupby_node) => {
            let groupby = string_sequence(groupby_node, source).unwrap_or_default();
            edits.push(EditSpan::copy_node(second, groupby_node));
            edits.push(EditSpan::replace_node(
                groupby_node,
                render(&aggregates(&fields, &groupby)),
            ));
        }
        None if call.keyword("groupby", source).is_some() => {
            let groupby = groupby_of(call, source).unwrap_or_default();
            edits.push(EditSpan::replace_node(
                second,
                format!("aggregates={}", render(&aggregates(&fields, &groupby))),
            ));
        }
        None => {}
    }
}

/// The literal `groupby`, passed by keyword or third by position.
fn groupby_of(call: &CallSite<'_>, source: &str) -> Option<Vec<String>> {
    let node = match call.keyword("groupby", source) {
        Some(Argument::Keyword { value, .. }) => value,
        _ => call.positional(2)?,
    };
    if let Some(values) = string_sequence(node, source) {
        return Some(values);
    }
    string_node_value(node, source).map(|value| vec![value])
}

fn looks_like_aggregates(values: &[String]) -> bool {
    !values.is_empty()
        && values
            .iter()
            .all(|value| value.contains(':') || value == "__count")
}

/// Converts a 16.0 field list into 17.0 aggregate specifications.
fn aggregates(fields: &[String], groupby: &[String]) -> Vec<String> {
    let converted: Vec<String> = fields
        .iter()
        .filter_map(|field| {
            if field.contains(':') {
                Some(field.clone())
            } else if groupby.contains(field) {
                None
            } else {
                Some(format!("{field}:sum"))
            }
        })
        .collect();
    if converted.is_empty() {
        vec!["__count".to_owned()]
    } else {
        converted
    }
}

fn render(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|value| python_repr(value)).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn grouped_fields_collapse_to_a_count() {
        let result = aggregates(&strings(&["partner_id"]), &strings(&["partner_id"]));
        assert_eq!(result, strings(&["__count"]));
    }

    #[test]
    fn bare_fields_are_summed_and_specs_kept() {
        let result = aggregates(
            &strings(&["amount", "qty:max", "partner_id"]),
            &strings(&["partner_id"]),
        );
        assert_eq!(result, strings(&["amount:sum", "qty:max"]));
    }

    #[test]
    fn count_lists_are_already_aggregates() {
        assert!(looks_like_aggregates(&strings(&["__count"])));
        assert!(!looks_like_aggregates(&strings(&["partner_id"])));
        assert!(!looks_like_aggregates(&[]));
    }
}
