//! The compiled, typed rule collection for one migration step.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::fragment::{
    ANY_EXTENSION, DeprecatedModule, RemovedField, RemovedModel, RenamedField, RenamedModel,
    RuleFragment, TextCheck, TextReplacement,
};

/// Ordered `pattern -> value` entries for one extension.
pub type PatternMap = IndexMap<String, String>;

/// Rules for one step, merged from every applicable fragment.
///
/// A `RuleSet` carries no module state and can be reused for every module
/// migrated through the step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    renames: IndexMap<String, String>,
    text_replacements: IndexMap<String, PatternMap>,
    text_errors: IndexMap<String, PatternMap>,
    text_warnings: IndexMap<String, PatternMap>,
    deprecated_modules: Vec<DeprecatedModule>,
    removed_fields: Vec<RemovedField>,
    renamed_fields: Vec<RenamedField>,
    renamed_models: Vec<RenamedModel>,
    removed_models: Vec<RemovedModel>,
    structural_rewriters: Vec<String>,
}

/// Two substitutions whose relative order changes the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingHazard {
    /// Extension list both rules belong to.
    pub extension: String,
    /// Pattern of the rule that runs first.
    pub earlier: String,
    /// Pattern of the rule that runs later and can see the earlier output.
    pub later: String,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `fragment` into the set.
    ///
    /// Dictionary entries follow last-write-wins and keep the position of
    /// their first declaration; lists are appended. A rewriter named twice
    /// runs once, at its first position.
    pub fn merge(&mut self, fragment: &RuleFragment) {
        for (from, to) in &fragment.renames {
            self.renames.insert(from.clone(), to.clone());
        }
        merge_replacements(&mut self.text_replacements, &fragment.text_replacements);
        merge_checks(&mut self.text_errors, &fragment.text_errors);
        merge_checks(&mut self.text_warnings, &fragment.text_warnings);
        self.deprecated_modules
            .extend(fragment.deprecated_modules.iter().cloned());
        self.removed_fields
            .extend(fragment.removed_fields.iter().cloned());
        self.renamed_fields
            .extend(fragment.renamed_fields.iter().cloned());
        self.renamed_models
            .extend(fragment.renamed_models.iter().cloned());
        self.removed_models
            .extend(fragment.removed_models.iter().cloned());
        for name in &fragment.structural_rewriters {
            if !self.structural_rewriters.contains(name) {
                self.structural_rewriters.push(name.clone());
            }
        }
    }

    /// File renames keyed by current file name.
    #[must_use]
    pub const fn renames(&self) -> &IndexMap<String, String> {
        &self.renames
    }

    /// Returns the new name for `file_name`, if a rename applies.
    #[must_use]
    pub fn rename_for(&self, file_name: &str) -> Option<&str> {
        self.renames.get(file_name).map(String::as_str)
    }

    /// Substitutions per extension.
    #[must_use]
    pub const fn text_replacements(&self) -> &IndexMap<String, PatternMap> {
        &self.text_replacements
    }

    /// Error checks per extension.
    #[must_use]
    pub const fn text_errors(&self) -> &IndexMap<String, PatternMap> {
        &self.text_errors
    }

    /// Warning checks per extension.
    #[must_use]
    pub const fn text_warnings(&self) -> &IndexMap<String, PatternMap> {
        &self.text_warnings
    }

    /// Effective substitutions for a file with `extension`.
    ///
    /// The extension list is overlaid onto the `"*"` list: shared patterns
    /// take the extension's value at the `"*"` position, new patterns follow.
    #[must_use]
    pub fn replacements_for(&self, extension: &str) -> Vec<(&str, &str)> {
        overlay(&self.text_replacements, extension)
    }

    /// Effective error checks for a file with `extension`.
    #[must_use]
    pub fn errors_for(&self, extension: &str) -> Vec<(&str, &str)> {
        overlay(&self.text_errors, extension)
    }

    /// Effective warning checks for a file with `extension`.
    #[must_use]
    pub fn warnings_for(&self, extension: &str) -> Vec<(&str, &str)> {
        overlay(&self.text_warnings, extension)
    }

    /// Deprecated modules in resolution order.
    #[must_use]
    pub fn deprecated_modules(&self) -> &[DeprecatedModule] {
        &self.deprecated_modules
    }

    /// Removed fields.
    #[must_use]
    pub fn removed_fields(&self) -> &[RemovedField] {
        &self.removed_fields
    }

    /// Renamed fields.
    #[must_use]
    pub fn renamed_fields(&self) -> &[RenamedField] {
        &self.renamed_fields
    }

    /// Renamed models.
    #[must_use]
    pub fn renamed_models(&self) -> &[RenamedModel] {
        &self.renamed_models
    }

    /// Removed models.
    #[must_use]
    pub fn removed_models(&self) -> &[RemovedModel] {
        &self.removed_models
    }

    /// Structural rewriters to run, in order.
    #[must_use]
    pub fn structural_rewriters(&self) -> &[String] {
        &self.structural_rewriters
    }

    /// Every pattern in the set with the extension it is declared under.
    pub fn patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            &self.text_replacements,
            &self.text_errors,
            &self.text_warnings,
        ]
        .into_iter()
        .flat_map(|collection| {
            collection.iter().flat_map(|(extension, entries)| {
                entries
                    .keys()
                    .map(move |pattern| (extension.as_str(), pattern.as_str()))
            })
        })
    }

    /// Returns whether the set holds no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
            && self.text_replacements.is_empty()
            && self.text_errors.is_empty()
            && self.text_warnings.is_empty()
            && self.deprecated_modules.is_empty()
            && self.removed_fields.is_empty()
            && self.renamed_fields.is_empty()
            && self.renamed_models.is_empty()
            && self.removed_models.is_empty()
            && self.structural_rewriters.is_empty()
    }

    /// Finds substitution pairs whose order matters.
    ///
    /// A pair is flagged when the later pattern matches the earlier rule's
    /// replacement text or its pattern source, i.e. the later rule can see
    /// text the earlier rule produced or competes for the same input.
    /// Patterns that fail to compile are skipped here; compilation reports
    /// them separately.
    #[must_use]
    pub fn ordering_hazards(&self) -> Vec<OrderingHazard> {
        let mut extensions: Vec<&str> = self.text_replacements.keys().map(String::as_str).collect();
        if !extensions.contains(&ANY_EXTENSION) {
            extensions.push(ANY_EXTENSION);
        }

        let mut hazards = Vec::new();
        for extension in extensions {
            let rules: Vec<(&str, &str, Regex)> = self
                .replacements_for(extension)
                .into_iter()
                .filter_map(|(pattern, replacement)| {
                    Regex::new(pattern)
                        .ok()
                        .map(|regex| (pattern, replacement, regex))
                })
                .collect();

            for (position, (earlier, replacement, _)) in rules.iter().enumerate() {
                for (later, _, regex) in rules.iter().skip(position + 1) {
                    let sees_output = !replacement.is_empty() && regex.is_match(replacement);
                    if sees_output || regex.is_match(earlier) {
                        let hazard = OrderingHazard {
                            extension: extension.to_owned(),
                            earlier: (*earlier).to_owned(),
                            later: (*later).to_owned(),
                        };
                        if !hazards.contains(&hazard) {
                            hazards.push(hazard);
                        }
                    }
                }
            }
        }
        hazards
    }
}

fn merge_replacements(
    target: &mut IndexMap<String, PatternMap>,
    source: &IndexMap<String, Vec<TextReplacement>>,
) {
    for (extension, entries) in source {
        let map = target.entry(extension.clone()).or_default();
        for entry in entries {
            map.insert(entry.pattern.clone(), entry.replacement.clone());
        }
    }
}

fn merge_checks(target: &mut IndexMap<String, PatternMap>, source: &IndexMap<String, Vec<TextCheck>>) {
    for (extension, entries) in source {
        let map = target.entry(extension.clone()).or_default();
        for entry in entries {
            map.insert(entry.pattern.clone(), entry.message.clone());
        }
    }
}

fn overlay<'a>(collection: &'a IndexMap<String, PatternMap>, extension: &str) -> Vec<(&'a str, &'a str)> {
    let mut merged: IndexMap<&str, &str> = IndexMap::new();
    let layers = [
        collection.get(ANY_EXTENSION),
        (extension != ANY_EXTENSION)
            .then(|| collection.get(extension))
            .flatten(),
    ];
    for layer in layers.into_iter().flatten() {
        for (pattern, value) in layer {
            merged.insert(pattern.as_str(), value.as_str());
        }
    }
    merged.into_iter().collect()
}
