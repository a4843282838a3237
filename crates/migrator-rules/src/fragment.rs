//! Rule fragments: partial rule sets contributed by one source for one scope.
//!
//! Fragments are the unit every rule source produces. Declarative fragments
//! are decoded from YAML documents such as:
//!
//! ```yaml
//! scope:
//!   init: "8.0"
//!   target: "9.0"
//! renames:
//!   __openerp__.py: __manifest__.py
//! text_replacements:
//!   ".py":
//!     - pattern: 'select=True'
//!       replacement: 'index=True'
//! deprecated_modules:
//!   - { name: account_chart, action: merged, new_name: account }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::version::{MigrationPath, PathStep, Version, VersionCatalog, VersionStep};

/// Extension key whose rules apply to every file.
pub const ANY_EXTENSION: &str = "*";

/// One regex substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextReplacement {
    /// Regular expression to search for.
    pub pattern: String,
    /// Replacement text; `$1` and `${name}` refer to capture groups.
    pub replacement: String,
}

impl TextReplacement {
    /// Builds a substitution.
    #[must_use]
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// One regex that raises a diagnostic when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextCheck {
    /// Regular expression to search for.
    pub pattern: String,
    /// Diagnostic message reported on a match.
    pub message: String,
}

impl TextCheck {
    /// Builds a check.
    #[must_use]
    pub fn new(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

/// What happened to a deprecated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeprecationAction {
    /// The module no longer exists.
    Removed,
    /// The module exists under a new name.
    Renamed,
    /// The module's features moved into another module.
    Merged,
    /// The module moved to an OCA repository.
    OcaMoved,
}

/// A module whose dependency declarations need attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecatedModule {
    /// Technical name of the deprecated module.
    pub name: String,
    /// What happened to it.
    pub action: DeprecationAction,
    /// Replacement module, for renames, merges and moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A field removed from a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemovedField {
    /// Model technical name, e.g. `product.product`.
    pub model: String,
    /// Removed field name.
    pub field: String,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A field renamed on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamedField {
    /// Model technical name.
    pub model: String,
    /// Previous field name.
    pub old: String,
    /// New field name.
    pub new: String,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A model that changed its technical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamedModel {
    /// Previous model name.
    pub old: String,
    /// New model name.
    pub new: String,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A model that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemovedModel {
    /// Model technical name.
    pub model: String,
    /// Free-form explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Declared scope of a fragment, as written in a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeSpec {
    /// Initial version of a single-step fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    /// Target version of a single-step fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Version after which the fragment applies to every migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    /// Marks a fragment for the terminal step.
    pub always: bool,
}

impl ScopeSpec {
    /// Scope of a single catalog step.
    #[must_use]
    pub fn step(init: &str, target: &str) -> Self {
        Self {
            init: Some(init.to_owned()),
            target: Some(target.to_owned()),
            ..Self::default()
        }
    }

    /// Scope of every migration whose target is newer than `version`.
    #[must_use]
    pub fn since(version: &str) -> Self {
        Self {
            since: Some(version.to_owned()),
            ..Self::default()
        }
    }

    /// Scope of the terminal step.
    #[must_use]
    pub fn always() -> Self {
        Self {
            always: true,
            ..Self::default()
        }
    }

    /// Resolves the declared labels against `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidFragment`] when the declaration mixes or
    /// omits scope kinds, and [`RulesError::UnknownVersion`] for labels the
    /// catalog does not know.
    pub fn resolve(&self, catalog: &VersionCatalog, origin: &str) -> Result<StepScope, RulesError> {
        match (&self.init, &self.target, &self.since, self.always) {
            (Some(init), Some(target), None, false) => {
                let step = VersionStep::new(catalog.version(init)?, catalog.version(target)?);
                if !catalog.steps().contains(&step) {
                    return Err(RulesError::invalid_fragment(
                        origin,
                        format!("{step} is not a catalog step"),
                    ));
                }
                Ok(StepScope::Step(step))
            }
            (None, None, Some(since), false) => Ok(StepScope::Since(catalog.version(since)?)),
            (None, None, None, true) => Ok(StepScope::Always),
            _ => Err(RulesError::invalid_fragment(
                origin,
                "scope must declare either init and target, since, or always",
            )),
        }
    }
}

/// Resolved scope of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepScope {
    /// Exactly one catalog step.
    Step(VersionStep),
    /// Every migration whose target is newer than the version. The fragment
    /// joins the first catalog step of the path that passes that version.
    Since(Version),
    /// The terminal step.
    Always,
}

impl StepScope {
    /// Returns whether a fragment with this scope joins `step` of `path`.
    #[must_use]
    pub fn applies_to(self, step: PathStep, path: &MigrationPath) -> bool {
        match (self, step) {
            (Self::Step(scoped), PathStep::Versioned(current)) => scoped == current,
            (Self::Since(since), PathStep::Versioned(current)) => {
                path.first_step_after(since) == Some(current)
            }
            (Self::Always, PathStep::Always) => true,
            _ => false,
        }
    }
}

/// A partial rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleFragment {
    /// Declared scope; ignored for fragments built in code.
    pub scope: ScopeSpec,
    /// File renames keyed by the current file name.
    pub renames: IndexMap<String, String>,
    /// Ordered substitutions per extension.
    pub text_replacements: IndexMap<String, Vec<TextReplacement>>,
    /// Ordered error checks per extension.
    pub text_errors: IndexMap<String, Vec<TextCheck>>,
    /// Ordered warning checks per extension.
    pub text_warnings: IndexMap<String, Vec<TextCheck>>,
    /// Deprecated modules, in resolution order.
    pub deprecated_modules: Vec<DeprecatedModule>,
    /// Removed fields.
    pub removed_fields: Vec<RemovedField>,
    /// Renamed fields.
    pub renamed_fields: Vec<RenamedField>,
    /// Renamed models.
    pub renamed_models: Vec<RenamedModel>,
    /// Removed models.
    pub removed_models: Vec<RemovedModel>,
    /// Names of registered structural rewriters to run, in order.
    pub structural_rewriters: Vec<String>,
}

impl RuleFragment {
    /// Decodes a fragment from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidFragment`] when the document does not
    /// match the fragment schema.
    pub fn from_yaml(origin: &str, text: &str) -> Result<Self, RulesError> {
        serde_saphyr::from_str(text)
            .map_err(|error| RulesError::invalid_fragment(origin, error.to_string()))
    }

    /// Declares a structural rewriter.
    #[must_use]
    pub fn with_rewriter(mut self, name: impl Into<String>) -> Self {
        self.structural_rewriters.push(name.into());
        self
    }

    /// Adds a substitution for `extension`.
    #[must_use]
    pub fn with_replacement(
        mut self,
        extension: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.text_replacements
            .entry(extension.into())
            .or_default()
            .push(TextReplacement::new(pattern, replacement));
        self
    }

    /// Adds a file rename.
    #[must_use]
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }
}

/// A fragment paired with its resolved scope and provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedFragment {
    origin: String,
    scope: StepScope,
    fragment: RuleFragment,
}

impl ScopedFragment {
    /// Pairs a fragment with its scope.
    #[must_use]
    pub fn new(origin: impl Into<String>, scope: StepScope, fragment: RuleFragment) -> Self {
        Self {
            origin: origin.into(),
            scope,
            fragment,
        }
    }

    /// Decodes a YAML document and resolves its declared scope.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when decoding or scope resolution fails.
    pub fn from_yaml(
        catalog: &VersionCatalog,
        origin: &str,
        text: &str,
    ) -> Result<Self, RulesError> {
        let fragment = RuleFragment::from_yaml(origin, text)?;
        let scope = fragment.scope.resolve(catalog, origin)?;
        Ok(Self::new(origin, scope, fragment))
    }

    /// Identifier of the fragment's source, used to order fragments.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Resolved scope.
    #[must_use]
    pub const fn scope(&self) -> StepScope {
        self.scope
    }

    /// The rules.
    #[must_use]
    pub const fn fragment(&self) -> &RuleFragment {
        &self.fragment
    }
}
