//! Replaces `expression.AND`/`OR` with the 19.0 `Domain` helpers.

use migrator_rules::ScopeSpec;

use super::{RewriteContext, Rewriter, compile};
use crate::error::EngineError;

const DOMAIN_IMPORT: &str = "from odoo.fields import Domain";

/// The domain helper rewriter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomainHelpers;

impl Rewriter for DomainHelpers {
    fn name(&self) -> &'static str {
        "domain_helpers"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("18.0", "19.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let import = compile(r"(?m)^([ \t]*)from odoo\.osv import expression[ \t]*$")?;
        let import_line = compile(r"(?m)^[ \t]*from odoo\.osv import expression[ \t]*\n?")?;
        let helpers = compile(r"\bexpression\.(AND|OR)\(")?;
        let remaining = compile(r"\bexpression\.")?;
        let imported = compile(r"(?m)^[ \t]*from odoo\.fields import [^\n]*\bDomain\b")?;

        context.regex_pass(self.name(), &[".py"], |text| {
            if !import.is_match(text) {
                return text.to_owned();
            }
            let converted = helpers.replace_all(text, "Domain.${1}(");
            let still_used = remaining.is_match(&converted);
            match (still_used, imported.is_match(&converted)) {
                (true, true) => converted.into_owned(),
                (true, false) => import
                    .replace_all(&converted, format!("${{0}}\n${{1}}{DOMAIN_IMPORT}").as_str())
                    .into_owned(),
                (false, false) => import
                    .replace_all(&converted, format!("${{1}}{DOMAIN_IMPORT}").as_str())
                    .into_owned(),
                (false, true) => import_line.replace_all(&converted, "").into_owned(),
            }
        })
    }
}
