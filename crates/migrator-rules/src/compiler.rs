//! Compiles per-step rule sets from every fragment source.

use regex::Regex;

use crate::catalog::{ChangeCatalog, normalize};
use crate::error::RulesError;
use crate::fragment::{ScopedFragment, StepScope};
use crate::ruleset::RuleSet;
use crate::source::{FragmentSource, SourceKind};
use crate::version::{MigrationPath, PathStep, VersionCatalog, VersionStep};

/// The rules compiled for one step of a migration path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRules {
    step: PathStep,
    rules: RuleSet,
}

impl StepRules {
    /// Pairs a step with its rules.
    #[must_use]
    pub const fn new(step: PathStep, rules: RuleSet) -> Self {
        Self { step, rules }
    }

    /// The step.
    #[must_use]
    pub const fn step(&self) -> PathStep {
        self.step
    }

    /// The merged rules.
    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

/// Gathers fragments and merges them into one [`RuleSet`] per step.
///
/// Fragments merge in precedence order: declarative, then registered, then
/// remote. Within a kind, sources merge in the order they were added and
/// each source's fragments are ordered by origin, so the discovery order of
/// files never changes the result.
pub struct RuleSetCompiler {
    catalog: VersionCatalog,
    sources: Vec<Box<dyn FragmentSource>>,
    remote: Option<Box<dyn ChangeCatalog>>,
}

impl std::fmt::Debug for RuleSetCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSetCompiler")
            .field("catalog", &self.catalog)
            .field("sources", &self.sources.len())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl RuleSetCompiler {
    /// Creates a compiler with no sources.
    #[must_use]
    pub fn new(catalog: VersionCatalog) -> Self {
        Self {
            catalog,
            sources: Vec::new(),
            remote: None,
        }
    }

    /// Adds a fragment source.
    #[must_use]
    pub fn with_source(mut self, source: impl FragmentSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Adds the remote change catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl ChangeCatalog + 'static) -> Self {
        self.remote = Some(Box::new(catalog));
        self
    }

    /// The version catalog fragments are resolved against.
    #[must_use]
    pub const fn catalog(&self) -> &VersionCatalog {
        &self.catalog
    }

    /// Resolves a migration path against the compiler's catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnresolvablePath`] when the catalog has no path.
    pub fn resolve(&self, init: &str, target: &str) -> Result<MigrationPath, RulesError> {
        MigrationPath::resolve(&self.catalog, init, target)
    }

    /// Compiles the rules of every step of `path`, in path order.
    ///
    /// Every pattern is validated before the call returns, so a
    /// configuration error surfaces before any file is touched.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when a source fails to load or a pattern does
    /// not compile.
    pub fn compile(&self, path: &MigrationPath) -> Result<Vec<StepRules>, RulesError> {
        let fragments = self.load_fragments()?;
        path.steps()
            .into_iter()
            .map(|step| {
                let rules = self.merge_step(&fragments, step, path)?;
                Ok(StepRules::new(step, rules))
            })
            .collect()
    }

    /// Compiles the rules of one step of `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when a source fails to load or a pattern does
    /// not compile.
    pub fn compile_step(&self, step: PathStep, path: &MigrationPath) -> Result<RuleSet, RulesError> {
        let fragments = self.load_fragments()?;
        self.merge_step(&fragments, step, path)
    }

    fn load_fragments(&self) -> Result<Vec<(SourceKind, ScopedFragment)>, RulesError> {
        let mut fragments = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            let kind = source.kind();
            fragments.extend(
                source
                    .load(&self.catalog)?
                    .into_iter()
                    .map(|fragment| (kind, index, fragment)),
            );
        }
        fragments.sort_by(|(left_kind, left_index, left), (right_kind, right_index, right)| {
            left_kind
                .cmp(right_kind)
                .then_with(|| left_index.cmp(right_index))
                .then_with(|| left.origin().cmp(right.origin()))
        });
        Ok(fragments
            .into_iter()
            .map(|(kind, _, fragment)| (kind, fragment))
            .collect())
    }

    fn merge_step(
        &self,
        fragments: &[(SourceKind, ScopedFragment)],
        step: PathStep,
        path: &MigrationPath,
    ) -> Result<RuleSet, RulesError> {
        let mut rules = RuleSet::new();
        let mut origins = Vec::new();
        for (_, scoped) in fragments {
            if scoped.scope().applies_to(step, path) {
                validate_patterns(scoped)?;
                rules.merge(scoped.fragment());
                origins.push(scoped.origin());
            }
        }

        if let PathStep::Versioned(versioned) = step {
            self.merge_remote(&mut rules, versioned)?;
        }

        for hazard in rules.ordering_hazards() {
            tracing::warn!(
                target: "migrator_rules::compiler",
                event = "rules.ordering_hazard",
                step = %step,
                extension = %hazard.extension,
                earlier = %hazard.earlier,
                later = %hazard.later,
                "replacement order affects the result"
            );
        }

        tracing::debug!(
            target: "migrator_rules::compiler",
            event = "rules.step_compiled",
            step = %step,
            fragments = ?origins,
            rewriters = ?rules.structural_rewriters(),
            "compiled step rules"
        );
        Ok(rules)
    }

    fn merge_remote(&self, rules: &mut RuleSet, step: VersionStep) -> Result<(), RulesError> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        match remote.changes(step) {
            Ok(records) => {
                let fragment = normalize(&records);
                let scoped = ScopedFragment::new(
                    format!("remote:{}", step.target().code()),
                    StepScope::Step(step),
                    fragment,
                );
                validate_patterns(&scoped)?;
                rules.merge(scoped.fragment());
                tracing::debug!(
                    target: "migrator_rules::compiler",
                    event = "rules.remote_merged",
                    step = %step,
                    records = records.len(),
                    "merged remote change records"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: "migrator_rules::compiler",
                    event = "rules.remote_unavailable",
                    step = %step,
                    error = %error,
                    "continuing without remote rules"
                );
            }
        }
        Ok(())
    }
}

/// Checks that every pattern of a fragment compiles.
fn validate_patterns(scoped: &ScopedFragment) -> Result<(), RulesError> {
    let fragment = scoped.fragment();
    let replacements = fragment
        .text_replacements
        .values()
        .flatten()
        .map(|rule| rule.pattern.as_str());
    let checks = fragment
        .text_errors
        .values()
        .chain(fragment.text_warnings.values())
        .flatten()
        .map(|rule| rule.pattern.as_str());

    for pattern in replacements.chain(checks) {
        Regex::new(pattern).map_err(|error| RulesError::InvalidPattern {
            origin: scoped.origin().to_owned(),
            pattern: pattern.to_owned(),
            message: error.to_string(),
        })?;
    }
    Ok(())
}
