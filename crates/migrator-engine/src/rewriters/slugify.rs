//! Moves `slug` and `slugify` onto the `ir.http` model.
//!
//! The module-level helpers of `http_routing` became model methods in 18.0.
//! Calls go through `request.env` when the file imports `request`, and
//! through `self.env` otherwise.

use migrator_rules::ScopeSpec;
use migrator_syntax::python::{find_calls, node_text};
use migrator_syntax::{EditSpan, ParseResult};

use super::imports::ImportFrom;
use super::{RewriteContext, Rewriter};
use crate::error::EngineError;

const HTTP_ROUTING: &str = "odoo.addons.http_routing.models.ir_http";
const HELPERS: [&str; 2] = ["slug", "slugify"];

/// The slug helper rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlugifyHelper;

impl Rewriter for SlugifyHelper {
    fn name(&self) -> &'static str {
        "slugify_helper"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("17.0", "18.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        context.python_pass(self.name(), "slug", |parsed, _| slug_edits(parsed))
    }
}

fn slug_edits(parsed: &ParseResult) -> Vec<EditSpan> {
    let source = parsed.source();
    let root = parsed.root_node();
    let imports = ImportFrom::all(root);

    let routing: Vec<&ImportFrom<'_>> = imports
        .iter()
        .filter(|import| import.module(source) == HTTP_ROUTING)
        .collect();
    let helpers: Vec<&str> = HELPERS
        .into_iter()
        .filter(|helper| routing.iter().any(|import| import.imports(helper, source)))
        .collect();
    if helpers.is_empty() {
        return Vec::new();
    }

    let env = if imports
        .iter()
        .any(|import| import.module(source) == "odoo.http" && import.imports("request", source))
    {
        "request.env"
    } else {
        "self.env"
    };

    let mut edits: Vec<EditSpan> = routing
        .iter()
        .filter_map(|import| import.without(&helpers, source))
        .collect();
    for call in find_calls(root, source, |name| helpers.contains(&name)) {
        let function = call.function();
        if function.kind() == "identifier" {
            let helper = node_text(function, source);
            edits.push(EditSpan::replace_node(
                function,
                format!(r#"{env}["ir.http"]._{helper}"#),
            ));
        }
    }
    edits
}
