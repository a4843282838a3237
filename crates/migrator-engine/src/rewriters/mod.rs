//! Structural rewriters and their registry.
//!
//! A rewriter is a named pass over a module that performs its own
//! read-transform-write cycle. Rule sets refer to rewriters by name; the
//! [`RewriterRegistry`] maps those names to implementations and contributes
//! the fragments declaring which step runs which rewriter.
//!
//! Two pass shapes cover the built-in rewriters:
//!
//! - regex passes transform the text of every matching file with ordered
//!   substitutions, some of which compute their replacement in code;
//! - Python passes parse each file, collect [`EditSpan`]s from the syntax
//!   tree and apply them with the [`Patcher`], repeating until the tree
//!   yields no further edits so nested targets are handled one layer at a
//!   time.

mod attrs;
mod constraints;
mod domain;
mod imports;
mod manifest;
mod read_group;
mod slugify;
mod translation;
mod ustr;
mod views;

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use migrator_rules::{
    MigrationPath, PathStep, RuleFragment, RulesError, ScopeSpec, ScopedFragment, StaticSource,
    VersionCatalog,
};
use migrator_syntax::{EditSpan, ParseResult, Parser, Patcher};
use regex::Regex;

use crate::diagnostics::{Aggregator, Diagnostic, Severity};
use crate::driver::MigrationOptions;
use crate::error::EngineError;
use crate::module::{OdooModule, extension_of};
use crate::textio::TextIo;

pub use attrs::AttrsToExpressions;
pub use constraints::SqlConstraints;
pub use domain::DomainHelpers;
pub use manifest::{BumpVersion, RemoveMigrationFolder, SetModuleInstallable};
pub use read_group::ReadGroupArguments;
pub use slugify::SlugifyHelper;
pub use translation::TranslationFormat;
pub use ustr::RemoveUstr;
pub use views::{ChatterBlocks, TreeToList};

const REWRITER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::rewriters");

/// Upper bound on parse-edit rounds per file for one Python pass.
const MAX_ROUNDS: usize = 8;

/// A named, self-contained transformation pass over a module.
pub trait Rewriter {
    /// Name rule sets use to request the rewriter.
    fn name(&self) -> &'static str;

    /// Steps the rewriter runs in.
    fn scope(&self) -> ScopeSpec;

    /// Runs the pass.
    ///
    /// Problems in individual files are recorded as diagnostics on the
    /// context; an error return is reserved for failures that stop the pass
    /// for the whole module.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the module cannot be read or written.
    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError>;
}

/// Everything a rewriter may touch while it runs.
pub struct RewriteContext<'a> {
    module: &'a OdooModule,
    manifest: PathBuf,
    path: &'a MigrationPath,
    step: PathStep,
    io: TextIo,
    options: &'a MigrationOptions,
    diagnostics: &'a mut Aggregator,
}

impl fmt::Debug for RewriteContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteContext")
            .field("module", &self.module.name())
            .field("manifest", &self.manifest)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl<'a> RewriteContext<'a> {
    /// Builds a context for one step of one module.
    #[must_use]
    pub const fn new(
        module: &'a OdooModule,
        manifest: PathBuf,
        path: &'a MigrationPath,
        step: PathStep,
        options: &'a MigrationOptions,
        diagnostics: &'a mut Aggregator,
    ) -> Self {
        Self {
            module,
            manifest,
            path,
            step,
            io: TextIo::new(),
            options,
            diagnostics,
        }
    }

    /// The module being migrated.
    #[must_use]
    pub const fn module(&self) -> &OdooModule {
        self.module
    }

    /// The manifest as located at the start of the step.
    #[must_use]
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// The whole migration path.
    #[must_use]
    pub const fn path(&self) -> &MigrationPath {
        self.path
    }

    /// The step being run.
    #[must_use]
    pub const fn step(&self) -> PathStep {
        self.step
    }

    /// The shared text helper.
    #[must_use]
    pub const fn io(&self) -> TextIo {
        self.io
    }

    /// Run options.
    #[must_use]
    pub const fn options(&self) -> &MigrationOptions {
        self.options
    }

    /// Records a diagnostic for the module.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.record(diagnostic);
    }

    /// Lists module files with one of `extensions` that the run is allowed
    /// to transform, in path order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when the module tree cannot be walked.
    pub fn files(&self, extensions: &[&str]) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self
            .module
            .files()?
            .into_iter()
            .filter(|path| {
                let extension = extension_of(path);
                extensions.contains(&extension.as_str()) && self.options.allows(&extension)
            })
            .collect())
    }

    /// Applies `transform` to the text of every file with one of
    /// `extensions`, writing the files it changes.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when a file cannot be read or written.
    pub fn regex_pass(
        &mut self,
        rewriter: &str,
        extensions: &[&str],
        transform: impl Fn(&str) -> String,
    ) -> Result<(), EngineError> {
        for file in self.files(extensions)? {
            let original = match self.io.read(&file) {
                Ok(text) => text,
                Err(EngineError::NotUtf8 { .. }) => continue,
                Err(error) => return Err(error),
            };
            let updated = transform(&original);
            if self.io.write_if_changed(&file, &original, &updated)? {
                self.log_rewrite(rewriter, &file);
            }
        }
        Ok(())
    }

    /// Runs a syntax-tree pass over every Python file containing `needle`.
    ///
    /// `collect` inspects a parsed file and returns the edits to apply; it
    /// may push diagnostics, which are attributed to the file. Rounds repeat
    /// on the patched text until no edits remain, so every round must leave
    /// the file parseable.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when a file cannot be read or written or
    /// the parser cannot be created.
    pub fn python_pass(
        &mut self,
        rewriter: &str,
        needle: &str,
        mut collect: impl FnMut(&ParseResult, &mut Vec<Diagnostic>) -> Vec<EditSpan>,
    ) -> Result<(), EngineError> {
        let mut parser = Parser::python()?;
        for file in self.files(&[".py"])? {
            let original = match self.io.read(&file) {
                Ok(text) => text,
                Err(EngineError::NotUtf8 { .. }) => continue,
                Err(error) => return Err(error),
            };
            if !original.contains(needle) {
                continue;
            }
            let relative = self.module.relative(&file);
            let mut findings = Vec::new();
            let outcome = patch_to_fixpoint(&mut parser, &original, &mut collect, &mut findings);
            for finding in findings {
                self.diagnostics.record(finding.in_file(&relative));
            }
            let patched = match outcome {
                Ok(text) => text,
                Err(problem) => {
                    tracing::debug!(
                        target: REWRITER_TARGET,
                        event = "file_skipped",
                        module = self.module.name(),
                        rewriter,
                        file = %relative.display(),
                        detail = problem.detail(),
                        "rewriter left file untouched"
                    );
                    self.diagnostics
                        .record(problem.diagnostic(rewriter).in_file(&relative));
                    continue;
                }
            };
            if self.io.write_if_changed(&file, &original, &patched)? {
                self.log_rewrite(rewriter, &file);
            }
        }
        Ok(())
    }

    fn log_rewrite(&self, rewriter: &str, file: &Path) {
        tracing::info!(
            target: REWRITER_TARGET,
            event = "file_rewritten",
            module = self.module.name(),
            step = %self.step,
            rewriter,
            file = %self.module.relative(file).display(),
            "rewriter updated file"
        );
    }
}

/// Why a Python pass left a file untouched.
#[derive(Debug)]
enum PassProblem {
    Unparsable(String),
    Conflict(String),
}

impl PassProblem {
    fn detail(&self) -> &str {
        match self {
            Self::Unparsable(detail) | Self::Conflict(detail) => detail,
        }
    }

    fn diagnostic(&self, rewriter: &str) -> Diagnostic {
        let message = match self {
            Self::Unparsable(_) => {
                format!("{rewriter} skipped: the file could not be parsed")
            }
            Self::Conflict(_) => format!("{rewriter} skipped: conflicting edits"),
        };
        Diagnostic::new(Severity::Error, message)
    }
}

fn patch_to_fixpoint(
    parser: &mut Parser,
    original: &str,
    collect: &mut impl FnMut(&ParseResult, &mut Vec<Diagnostic>) -> Vec<EditSpan>,
    findings: &mut Vec<Diagnostic>,
) -> Result<String, PassProblem> {
    let mut text = original.to_owned();
    for _ in 0..MAX_ROUNDS {
        let parsed = parser
            .parse(&text)
            .map_err(|error| PassProblem::Unparsable(error.to_string()))?;
        if let Some(error) = parsed.first_error() {
            return Err(PassProblem::Unparsable(format!(
                "line {}: {}",
                error.line, error.message
            )));
        }
        let spans = collect(&parsed, findings);
        if spans.is_empty() {
            break;
        }
        text = Patcher::apply(&text, &spans).map_err(|error| PassProblem::Conflict(error.to_string()))?;
    }
    Ok(text)
}

/// Maps rewriter names to implementations.
pub struct RewriterRegistry {
    rewriters: IndexMap<&'static str, Box<dyn Rewriter>>,
}

impl fmt::Debug for RewriterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rewriters.keys()).finish()
    }
}

impl Default for RewriterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RewriterRegistry {
    /// A registry without rewriters.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rewriters: IndexMap::new(),
        }
    }

    /// A registry holding every built-in rewriter.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with(TranslationFormat)
            .with(ReadGroupArguments)
            .with(AttrsToExpressions)
            .with(TreeToList)
            .with(ChatterBlocks)
            .with(RemoveUstr)
            .with(SlugifyHelper)
            .with(SqlConstraints)
            .with(DomainHelpers)
            .with(SetModuleInstallable)
            .with(BumpVersion)
            .with(RemoveMigrationFolder)
    }

    /// Adds `rewriter`, replacing any rewriter registered under its name.
    #[must_use]
    pub fn with(mut self, rewriter: impl Rewriter + 'static) -> Self {
        self.register(rewriter);
        self
    }

    /// Adds `rewriter`, replacing any rewriter registered under its name.
    pub fn register(&mut self, rewriter: impl Rewriter + 'static) {
        self.rewriters.insert(rewriter.name(), Box::new(rewriter));
    }

    /// Looks a rewriter up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Rewriter> {
        self.rewriters.get(name).map(|rewriter| &**rewriter)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rewriters.keys().copied()
    }

    /// Builds the fragments that schedule the registered rewriters.
    ///
    /// Rewriters sharing a scope land in one fragment, listed in
    /// registration order; fragments follow the order in which their scope
    /// was first registered.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when a rewriter's scope names a step or
    /// version the catalog does not know.
    pub fn source(&self, catalog: &VersionCatalog) -> Result<StaticSource, RulesError> {
        let mut groups: Vec<(ScopeSpec, RuleFragment)> = Vec::new();
        for rewriter in self.rewriters.values() {
            let scope = rewriter.scope();
            if let Some((_, fragment)) = groups.iter_mut().find(|(known, _)| *known == scope) {
                fragment.structural_rewriters.push(rewriter.name().to_owned());
            } else {
                let fragment = RuleFragment::default().with_rewriter(rewriter.name());
                groups.push((scope, fragment));
            }
        }

        let fragments = groups
            .into_iter()
            .enumerate()
            .map(|(index, (scope, fragment))| {
                let origin = format!("registry:{index:02}");
                let resolved = scope.resolve(catalog, &origin)?;
                Ok(ScopedFragment::new(origin, resolved, fragment))
            })
            .collect::<Result<Vec<_>, RulesError>>()?;
        Ok(StaticSource::registered(fragments))
    }
}

/// Compiles a pattern owned by a built-in rewriter.
fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|error| {
        EngineError::Rules(RulesError::InvalidPattern {
            origin: "builtin rewriter".to_owned(),
            pattern: pattern.to_owned(),
            message: error.to_string(),
        })
    })
}
