//! Deprecated-entity resolution.
//!
//! Module dependencies are fixed in the manifest. Field and model changes are
//! located with a deliberately shallow heuristic: a reference counts only
//! when it appears in quoted form (or, for removals, as an attribute access)
//! inside a Python class or XML record bound to the affected model. Dynamic
//! references are missed and unrelated strings inside a matching scope can
//! be reported; both are accepted trade-offs.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use migrator_rules::{DeprecatedModule, DeprecationAction, RuleSet, quoted_pattern};
use migrator_syntax::python::{node_text, string_node_value, string_sequence, walk};
use migrator_syntax::{EditSpan, LineIndex, Parser, Patcher};
use regex::Regex;

use crate::diagnostics::Aggregator;
use crate::error::EngineError;
use crate::module::{OdooModule, extension_of};
use crate::textio::TextIo;

const RESOLVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolver");

#[expect(clippy::expect_used, reason = "the pattern is a valid literal")]
static XML_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<record\b([^>]*)>(.*?)</record>"#).expect("valid record pattern")
});

#[expect(clippy::expect_used, reason = "the pattern is a valid literal")]
static XML_MODEL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bmodel\s*=\s*["']([^"']+)["']"#).expect("valid model attribute pattern")
});

#[expect(clippy::expect_used, reason = "the pattern is a valid literal")]
static XML_MODEL_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<field\s+name=["']model["']\s*>\s*([^<\s]+)\s*</field>"#)
        .expect("valid model field pattern")
});

/// Applies the deprecated-entity tables of one step to a module.
#[derive(Debug, Clone, Copy)]
pub struct DeprecatedEntityResolver<'r> {
    rules: &'r RuleSet,
    io: TextIo,
}

impl<'r> DeprecatedEntityResolver<'r> {
    /// Creates a resolver for `rules`.
    #[must_use]
    pub const fn new(rules: &'r RuleSet, io: TextIo) -> Self {
        Self { rules, io }
    }

    /// Rewrites the manifest's dependencies and checks `files` for removed
    /// or renamed fields and models.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the manifest cannot be read or
    /// written, or the parser cannot be created.
    pub fn resolve(
        &self,
        module: &OdooModule,
        manifest: &Path,
        files: &[PathBuf],
        diagnostics: &mut Aggregator,
    ) -> Result<(), EngineError> {
        self.resolve_modules(module, manifest, diagnostics)?;
        if self.has_entity_rules() {
            self.resolve_entities(module, files, diagnostics)?;
        }
        Ok(())
    }

    /// Applies the deprecated-module tuples, in order, to the manifest.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the manifest cannot be read or
    /// written.
    pub fn resolve_modules(
        &self,
        module: &OdooModule,
        manifest: &Path,
        diagnostics: &mut Aggregator,
    ) -> Result<(), EngineError> {
        if self.rules.deprecated_modules().is_empty() {
            return Ok(());
        }
        let relative = module.relative(manifest);
        let original = self.io.read(manifest)?;
        let mut text = original.clone();
        for entry in self.rules.deprecated_modules() {
            text = apply_deprecation(&text, entry, &relative, diagnostics);
        }
        if self.io.write_if_changed(manifest, &original, &text)? {
            tracing::info!(
                target: RESOLVER_TARGET,
                event = "manifest_updated",
                module = module.name(),
                "updated manifest dependencies"
            );
        }
        Ok(())
    }

    fn has_entity_rules(&self) -> bool {
        !(self.rules.removed_fields().is_empty()
            && self.rules.renamed_fields().is_empty()
            && self.rules.removed_models().is_empty()
            && self.rules.renamed_models().is_empty())
    }

    fn resolve_entities(
        &self,
        module: &OdooModule,
        files: &[PathBuf],
        diagnostics: &mut Aggregator,
    ) -> Result<(), EngineError> {
        let mut parser = Parser::python()?;
        for file in files {
            let extension = extension_of(file);
            if extension != ".py" && extension != ".xml" {
                continue;
            }
            let original = match self.io.read(file) {
                Ok(text) => text,
                Err(EngineError::NotUtf8 { .. }) => continue,
                Err(error) => return Err(error),
            };
            let relative = module.relative(file);
            let mut scan = FileScan {
                parser: &mut parser,
                python: extension == ".py",
                relative: &relative,
                diagnostics: &mut *diagnostics,
            };
            let updated = self.resolve_file(&mut scan, &original)?;
            if self.io.write_if_changed(file, &original, &updated)? {
                tracing::info!(
                    target: RESOLVER_TARGET,
                    event = "entities_renamed",
                    module = module.name(),
                    file = %relative.display(),
                    "renamed deprecated entity references"
                );
            }
        }
        Ok(())
    }

    fn resolve_file(&self, scan: &mut FileScan<'_>, source: &str) -> Result<String, EngineError> {
        let mut text = source.to_owned();
        let mut scopes = scan.scopes(&text)?;
        for rename in self.rules.renamed_models() {
            let ranges: Vec<Range<usize>> = scopes_for(&scopes, &rename.old).cloned().collect();
            let Some(updated) = rename_quoted_in(&text, &ranges, &rename.old, &rename.new)? else {
                continue;
            };
            text = updated;
            scopes = scan.scopes(&text)?;
            scan.diagnostics.warning(
                format!(
                    "Model '{}' renamed to '{}'. Check the remaining references.",
                    rename.old, rename.new
                ),
                Some(scan.relative),
            );
        }
        for removal in self.rules.removed_models() {
            if scopes_for(&scopes, &removal.model).next().is_some() {
                scan.diagnostics.error(
                    with_note(
                        format!("Model '{}' has been removed", removal.model),
                        removal.note.as_deref(),
                    ),
                    Some(scan.relative),
                );
            }
        }

        for removal in self.rules.removed_fields() {
            let referenced = scopes_for(&scopes, &removal.model).any(|range| {
                references_field(text.get(range.clone()).unwrap_or_default(), &removal.field)
            });
            if referenced {
                scan.diagnostics.error(
                    with_note(
                        format!(
                            "Field '{}' has been removed from model '{}'",
                            removal.field, removal.model
                        ),
                        removal.note.as_deref(),
                    ),
                    Some(scan.relative),
                );
            }
        }
        for rename in self.rules.renamed_fields() {
            let ranges: Vec<Range<usize>> = scopes_for(&scopes, &rename.model).cloned().collect();
            let Some(updated) = rename_quoted_in(&text, &ranges, &rename.old, &rename.new)? else {
                continue;
            };
            text = updated;
            // Scopes move when the old and new names differ in length.
            scopes = scan.scopes(&text)?;
            scan.diagnostics.warning(
                format!(
                    "Field '{}' of model '{}' renamed to '{}'. Check the remaining references.",
                    rename.old, rename.model, rename.new
                ),
                Some(scan.relative),
            );
        }
        Ok(text)
    }
}

struct FileScan<'a> {
    parser: &'a mut Parser,
    python: bool,
    relative: &'a Path,
    diagnostics: &'a mut Aggregator,
}

impl FileScan<'_> {
    fn scopes(&mut self, text: &str) -> Result<Vec<Scope>, EngineError> {
        if self.python {
            python_scopes(self.parser, text)
        } else {
            Ok(xml_scopes(text))
        }
    }
}

fn apply_deprecation(
    text: &str,
    entry: &DeprecatedModule,
    manifest: &Path,
    diagnostics: &mut Aggregator,
) -> String {
    let old = entry.name.as_str();
    let old_pattern = quoted_regex(old);
    if !old_pattern.is_match(text) {
        return text.to_owned();
    }
    let replace_with = |new: &str| {
        old_pattern
            .replace_all(text, format!("${{1}}{new}${{2}}").as_str())
            .into_owned()
    };

    match (entry.action, entry.new_name.as_deref()) {
        (DeprecationAction::Removed, _) | (_, None) => {
            diagnostics.error(
                format!("Depends on removed module '{old}'"),
                Some(manifest),
            );
            text.to_owned()
        }
        (DeprecationAction::Renamed, Some(new)) => {
            diagnostics.info(
                format!("Replaced dependency of '{old}' by '{new}'."),
                Some(manifest),
            );
            replace_with(new)
        }
        (DeprecationAction::OcaMoved, Some(new)) => {
            diagnostics.warning(
                format!(
                    "Replaced dependency of '{old}' by '{new}' ({})\nCheck that '{new}' is available on your system.",
                    entry.note.as_deref().unwrap_or_default()
                ),
                Some(manifest),
            );
            replace_with(new)
        }
        (DeprecationAction::Merged, Some(new)) => {
            if quoted_regex(new).is_match(text) {
                diagnostics.error(
                    format!(
                        "'{old}' merged in '{new}'. You should remove the dependency to '{old}' manually."
                    ),
                    Some(manifest),
                );
                text.to_owned()
            } else {
                diagnostics.info(
                    format!("'{old}' merged in '{new}'. Replacing dependency."),
                    Some(manifest),
                );
                replace_with(new)
            }
        }
    }
}

fn quoted_regex(value: &str) -> Regex {
    // An escaped literal between two quote classes always compiles.
    Regex::new(&quoted_pattern(value)).unwrap_or_else(|_| never_matches())
}

#[expect(clippy::expect_used, reason = "the pattern is a valid literal")]
fn never_matches() -> Regex {
    Regex::new(r"[^\s\S]").expect("valid empty pattern")
}

fn with_note(message: String, note: Option<&str>) -> String {
    match note {
        Some(detail) if !detail.is_empty() => format!("{message} ({detail})"),
        _ => message,
    }
}

/// A class or record bound to one or more models.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scope {
    models: Vec<String>,
    bytes: Range<usize>,
}

fn scopes_for<'s>(scopes: &'s [Scope], model: &'s str) -> impl Iterator<Item = &'s Range<usize>> {
    scopes
        .iter()
        .filter(move |scope| scope.models.iter().any(|candidate| candidate == model))
        .map(|scope| &scope.bytes)
}

fn python_scopes(parser: &mut Parser, source: &str) -> Result<Vec<Scope>, EngineError> {
    let parsed = parser.parse(source)?;
    let mut scopes = Vec::new();
    walk(parsed.root_node(), &mut |node| {
        if node.kind() != "class_definition" {
            return;
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut models = Vec::new();
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            let Some(assignment) = statement
                .named_child(0)
                .filter(|child| statement.kind() == "expression_statement" && child.kind() == "assignment")
            else {
                continue;
            };
            let (Some(left), Some(right)) = (
                assignment.child_by_field_name("left"),
                assignment.child_by_field_name("right"),
            ) else {
                continue;
            };
            if !matches!(node_text(left, source), "_name" | "_inherit") {
                continue;
            }
            if let Some(value) = string_node_value(right, source) {
                models.push(value);
            } else if let Some(values) = string_sequence(right, source) {
                models.extend(values);
            }
        }
        if !models.is_empty() {
            models.dedup();
            scopes.push(Scope {
                models,
                bytes: node.byte_range(),
            });
        }
    });
    Ok(scopes)
}

fn xml_scopes(source: &str) -> Vec<Scope> {
    XML_RECORD
        .captures_iter(source)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let attributes = captures.get(1).map_or("", |m| m.as_str());
            let body = captures.get(2).map_or("", |m| m.as_str());
            let mut models = Vec::new();
            if let Some(model) = XML_MODEL_ATTRIBUTE.captures(attributes).and_then(|c| c.get(1)) {
                models.push(model.as_str().to_owned());
            }
            if let Some(model) = XML_MODEL_FIELD.captures(body).and_then(|c| c.get(1)) {
                models.push(model.as_str().to_owned());
            }
            (!models.is_empty()).then(|| Scope {
                models,
                bytes: whole.range(),
            })
        })
        .collect()
}

fn references_field(scope: &str, field: &str) -> bool {
    let escaped = regex::escape(field);
    let quoted = format!(r#"['"]{escaped}['"]"#);
    let attribute = format!(r"\.{escaped}\b");
    [quoted, attribute]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .any(|regex| regex.is_match(scope))
}

/// Replaces quoted occurrences of `old` inside `ranges` with `new`.
///
/// Returns `None` when nothing matched.
fn rename_quoted_in(
    text: &str,
    ranges: &[Range<usize>],
    old: &str,
    new: &str,
) -> Result<Option<String>, EngineError> {
    let pattern = quoted_regex(old);
    let index = LineIndex::new(text);
    let mut spans = Vec::new();
    let mut seen: Vec<Range<usize>> = Vec::new();
    for range in ranges {
        let Some(scope) = text.get(range.clone()) else {
            continue;
        };
        for captures in pattern.captures_iter(scope) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let open = captures.get(1).map_or("'", |m| m.as_str());
            let close = captures.get(2).map_or("'", |m| m.as_str());
            let absolute = (range.start + whole.start())..(range.start + whole.end());
            if seen.contains(&absolute) {
                continue;
            }
            seen.push(absolute.clone());
            let bytes = index.range(absolute);
            spans.push(EditSpan::replace(bytes.start, bytes.end, format!("{open}{new}{close}")));
        }
    }
    if spans.is_empty() {
        return Ok(None);
    }
    Ok(Some(Patcher::apply(text, &spans)?))
}
