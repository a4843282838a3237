//! View renames introduced in 18.0.

use migrator_rules::ScopeSpec;
use regex::{Captures, Regex};

use super::{RewriteContext, Rewriter, compile};
use crate::error::EngineError;

/// Turns `tree` views into `list` views.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeToList;

/// Substitutions applied in order after the literal phrase rewrite.
const TREE_PATTERNS: [(&str, &str); 10] = [
    (
        r#"(<field[^>]* name=["'](view_mode|name|binding_view_types)["'][^>]*>([^<>]+[,.])?\s*)tree(\s*([,.][^<>]+)?</field>)"#,
        "${1}list${4}",
    ),
    (r"([<,/])tree([ \n\r,>/])", "${1}list${2}"),
    (
        r#"(<xpath[^>]* expr=['"])([^<>]*/)?tree(/|[\['"])"#,
        "${1}${2}list${3}",
    ),
    ("tree_view_ref", "list_view_ref"),
    (r#"(mode=['"][^'"]*)tree([^'"]*['"])"#, "${1}list${2}"),
    (
        r#"(['"]view_mode['"][^'":=]*[:=].*['"]([^'"]+,)?\s*)tree(\s*(,[^'"]+)?['"])"#,
        "${1}list${3}",
    ),
    (
        r#"(['"]views['"][^'":]*[:=].*['"])tree(['"])"#,
        "${1}list${2}",
    ),
    (r#"([ '">)])tree( [vV]iews?[ '"<.)])"#, "${1}list${2}"),
    (r#"([ '">)])Tree( [vV]iews?[ '"<.)])"#, "${1}List${2}"),
    (r#"(self\.env\.ref\(.*['"])tree(['"])"#, "${1}list${2}"),
];

impl Rewriter for TreeToList {
    fn name(&self) -> &'static str {
        "tree_to_list"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("17.0", "18.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let rules = TREE_PATTERNS
            .iter()
            .map(|(pattern, replacement)| Ok((compile(pattern)?, *replacement)))
            .collect::<Result<Vec<(Regex, &str)>, EngineError>>()?;

        context.regex_pass(self.name(), &[".xml", ".js", ".py"], |text| {
            let mut current = text.replace(" tree view ", " list view ");
            for (regex, replacement) in &rules {
                current = regex.replace_all(&current, *replacement).into_owned();
            }
            current
        })
    }
}

/// Replaces chatter `div` blocks with the `chatter` element.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatterBlocks;

impl Rewriter for ChatterBlocks {
    fn name(&self) -> &'static str {
        "chatter_blocks"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("17.0", "18.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let block = compile(r#"<div class=["']oe_chatter["']([^>]*)>[\s\S]*?</div>"#)?;
        let positioned = compile(r#"position=["'][^"']+["']"#)?;
        let xpath = compile(r#"//div\[hasclass\(['"]oe_chatter['"]\)\]"#)?;
        let self_closing =
            compile(r#"<div class=["']oe_chatter["']\s*(position=["'][^"']+["'])\s*/>"#)?;

        context.regex_pass(self.name(), &[".xml"], |text| {
            // Blocks carrying a position attribute are xpath targets, not
            // chatter containers, and stay as they are.
            let blocks = block.replace_all(text, |captures: &Captures<'_>| {
                let attributes = captures.get(1).map_or("", |m| m.as_str());
                if positioned.is_match(attributes) {
                    captures.get(0).map_or("", |m| m.as_str()).to_owned()
                } else {
                    "<chatter/>".to_owned()
                }
            });
            let xpaths = xpath.replace_all(&blocks, "//chatter");
            self_closing
                .replace_all(&xpaths, "<chatter ${1}/>")
                .into_owned()
        })
    }
}
