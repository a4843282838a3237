//! Drops the `ustr` helper removed in 18.0.
//!
//! `ustr(value)` calls are replaced by their argument. The name is removed
//! from `odoo.tools` imports once nothing else refers to it; any other use
//! keeps the import and is reported.

use migrator_rules::ScopeSpec;
use migrator_syntax::python::{CallSite, find_calls, node_text, walk};
use migrator_syntax::{EditSpan, ParseResult};
use tree_sitter::Node;

use super::imports::ImportFrom;
use super::{RewriteContext, Rewriter};
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::EngineError;

/// Modules `ustr` could be imported from.
const USTR_MODULES: [&str; 2] = ["odoo.tools", "odoo.tools.misc"];

/// Qualifiers under which `ustr` is reachable as an attribute.
const USTR_OWNERS: [&str; 5] = [
    "tools",
    "misc",
    "tools.misc",
    "odoo.tools",
    "odoo.tools.misc",
];

/// Reported when `ustr` is referenced in a way no unwrap can remove.
const USTR_KEPT_MESSAGE: &str =
    "'ustr' is still used outside single-argument calls; its import was kept.";

/// The `ustr` removal rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveUstr;

impl Rewriter for RemoveUstr {
    fn name(&self) -> &'static str {
        "remove_ustr"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("17.0", "18.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        context.python_pass(self.name(), "ustr", ustr_edits)
    }
}

fn ustr_edits(parsed: &ParseResult, findings: &mut Vec<Diagnostic>) -> Vec<EditSpan> {
    let source = parsed.source();
    let root = parsed.root_node();

    let calls: Vec<CallSite<'_>> = find_calls(root, source, |name| name == "ustr")
        .into_iter()
        .filter(|call| is_ustr_callee(call, source))
        .collect();
    // Nested calls are left for the next round.
    let unwrapped: Vec<&CallSite<'_>> = calls
        .iter()
        .filter(|call| !is_nested(call, &calls))
        .filter(|call| call.arguments().len() == 1 && call.positional(0).is_some())
        .collect();
    let mut edits: Vec<EditSpan> = unwrapped
        .iter()
        .filter_map(|call| Some(EditSpan::copy_node(call.node(), call.positional(0)?)))
        .collect();

    let imports: Vec<ImportFrom<'_>> = ImportFrom::all(root)
        .into_iter()
        .filter(|import| USTR_MODULES.contains(&import.module(source)))
        .filter(|import| import.imports("ustr", source))
        .collect();
    if imports.is_empty() {
        return edits;
    }
    let callees: Vec<Node<'_>> = unwrapped.iter().map(|call| call.function()).collect();
    if has_other_references(root, source, &callees) {
        // Reported once, in the round that leaves nothing else to unwrap.
        if edits.is_empty() {
            findings.push(Diagnostic::new(Severity::Warning, USTR_KEPT_MESSAGE));
        }
        return edits;
    }
    edits.extend(
        imports
            .iter()
            .filter_map(|import| import.without(&["ustr"], source)),
    );
    edits
}

/// Whether a bare `ustr` name is used anywhere besides imports and the
/// callees about to be unwrapped.
fn has_other_references(root: Node<'_>, source: &str, callees: &[Node<'_>]) -> bool {
    let mut found = false;
    walk(root, &mut |node| {
        if found || node.kind() != "identifier" || node_text(node, source) != "ustr" {
            return;
        }
        if callees.contains(&node) {
            return;
        }
        let Some(parent) = node.parent() else {
            found = true;
            return;
        };
        let import_name = parent.kind() == "dotted_name" || parent.kind() == "aliased_import";
        let qualified = parent.kind() == "attribute"
            && parent.child_by_field_name("attribute") == Some(node);
        found = !(import_name || qualified);
    });
    found
}

fn is_ustr_callee(call: &CallSite<'_>, source: &str) -> bool {
    let function = call.function();
    match function.kind() {
        "identifier" => true,
        "attribute" => function
            .child_by_field_name("object")
            .is_some_and(|owner| USTR_OWNERS.contains(&node_text(owner, source))),
        _ => false,
    }
}

fn is_nested(call: &CallSite<'_>, calls: &[CallSite<'_>]) -> bool {
    let range = call.node().byte_range();
    calls.iter().any(|other| {
        let outer = other.node().byte_range();
        outer != range && outer.start <= range.start && range.end <= outer.end
    })
}
