//! The migration driver.
//!
//! A [`Migration`] is prepared once per run: the path is resolved, every
//! step's rules are compiled and every requested rewriter is looked up, so
//! configuration errors surface before any module file is touched. Modules
//! are then migrated one after another with the same compiled steps.
//!
//! For each step of a module the driver:
//!
//! 1. snapshots the files the step may touch;
//! 2. runs the text rules on each of them, renames first;
//! 3. locates the manifest again, as a rename may have moved it;
//! 4. resolves deprecated modules, fields and models;
//! 5. runs the step's structural rewriters in order.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use migrator_rules::{MigrationPath, RuleSetCompiler, RulesError};

use crate::diagnostics::Aggregator;
use crate::error::EngineError;
use crate::executor::{CompiledRules, TextRuleExecutor};
use crate::module::{OdooModule, discover_modules, extension_of};
use crate::report::ModuleReport;
use crate::resolver::DeprecatedEntityResolver;
use crate::rewriters::{RewriteContext, RewriterRegistry};
use crate::textio::TextIo;

const DRIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::driver");

/// Extensions a migration transforms unless configured otherwise.
pub const DEFAULT_EXTENSIONS: [&str; 4] = [".py", ".xml", ".js", ".csv"];

/// Run-wide switches shared by every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    extensions: Vec<String>,
    remove_migration_folder: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect(),
            remove_migration_folder: false,
        }
    }
}

impl MigrationOptions {
    /// Options with the default extension allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the extension allow-list. Extensions carry their leading
    /// dot.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Enables deleting each module's `migrations` folder.
    #[must_use]
    pub const fn with_remove_migration_folder(mut self, enabled: bool) -> Self {
        self.remove_migration_folder = enabled;
        self
    }

    /// The extension allow-list.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether files with `extension` may be transformed.
    #[must_use]
    pub fn allows(&self, extension: &str) -> bool {
        self.extensions.iter().any(|allowed| allowed == extension)
    }

    /// Whether the `migrations` folder is deleted.
    #[must_use]
    pub const fn remove_migration_folder(&self) -> bool {
        self.remove_migration_folder
    }
}

/// A prepared migration between two versions.
pub struct Migration {
    path: MigrationPath,
    steps: Vec<CompiledRules>,
    registry: RewriterRegistry,
    options: MigrationOptions,
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("path", &self.path)
            .field("steps", &self.steps.len())
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

impl Migration {
    /// Resolves the path from `init` to `target` and compiles every step.
    ///
    /// The registry's rewriter scopes are added to `compiler` as a
    /// registered source before compiling.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rules`] when the path cannot be resolved or a
    /// rule does not compile, and [`EngineError::UnknownRewriter`] when a
    /// step names a rewriter the registry lacks.
    pub fn prepare(
        compiler: RuleSetCompiler,
        registry: RewriterRegistry,
        init: &str,
        target: &str,
        options: MigrationOptions,
    ) -> Result<Self, EngineError> {
        let scheduled = registry.source(compiler.catalog())?;
        let full = compiler.with_source(scheduled);
        let path = full.resolve(init, target)?;
        let step_rules = full.compile(&path)?;

        for step in &step_rules {
            if let Some(name) = step
                .rules()
                .structural_rewriters()
                .iter()
                .find(|name| registry.get(name).is_none())
            {
                return Err(EngineError::UnknownRewriter {
                    name: name.clone(),
                    step: step.step().to_string(),
                });
            }
        }

        let steps = step_rules
            .iter()
            .map(CompiledRules::compile)
            .collect::<Result<Vec<_>, RulesError>>()?;
        tracing::info!(
            target: DRIVER_TARGET,
            event = "migration_prepared",
            init,
            target,
            steps = steps.len(),
            "compiled migration steps"
        );
        Ok(Self {
            path,
            steps,
            registry,
            options,
        })
    }

    /// The resolved migration path.
    #[must_use]
    pub const fn path(&self) -> &MigrationPath {
        &self.path
    }

    /// The compiled steps, in path order.
    #[must_use]
    pub fn steps(&self) -> &[CompiledRules] {
        &self.steps
    }

    /// The run options.
    #[must_use]
    pub const fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Migrates every module found in `directory`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the directory cannot be listed.
    pub fn run_directory(&self, directory: &Path) -> Result<Vec<ModuleReport>, EngineError> {
        let names = discover_modules(directory)?;
        Ok(self.run_modules(directory, &names))
    }

    /// Migrates the named modules of `directory`, in the given order.
    ///
    /// A module that cannot be opened gets a report holding the failure and
    /// the remaining modules still run.
    #[must_use]
    pub fn run_modules(&self, directory: &Path, names: &[String]) -> Vec<ModuleReport> {
        names
            .iter()
            .map(|name| {
                self.run_module(directory, name)
                    .unwrap_or_else(|error| ModuleReport::aborted(name, &error))
            })
            .collect()
    }

    /// Migrates one module through every step and returns its report.
    ///
    /// Problems in module files become diagnostics. A step that cannot run
    /// at all, because the manifest vanished or the tree cannot be walked,
    /// is reported as an error and ends the module's migration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModuleNotFound`] or
    /// [`EngineError::ManifestNotFound`] when the module cannot be opened.
    pub fn run_module(&self, directory: &Path, name: &str) -> Result<ModuleReport, EngineError> {
        let module = OdooModule::open(directory, name)?;
        let mut diagnostics = Aggregator::new(name);
        tracing::info!(
            target: DRIVER_TARGET,
            event = "module_started",
            module = name,
            steps = self.steps.len(),
            "migrating module"
        );
        for rules in &self.steps {
            if let Err(error) = self.run_step(&module, rules, &mut diagnostics) {
                tracing::warn!(
                    target: DRIVER_TARGET,
                    event = "module_stopped",
                    module = name,
                    step = %rules.step(),
                    error = %error,
                    "step could not run; skipping the remaining steps"
                );
                diagnostics.error(
                    format!("Migration stopped at step {}: {error}", rules.step()),
                    None,
                );
                break;
            }
        }
        let report = diagnostics.into_report();
        tracing::info!(
            target: DRIVER_TARGET,
            event = "module_finished",
            module = name,
            entries = report.entries().len(),
            has_errors = report.has_errors(),
            "module migrated"
        );
        Ok(report)
    }

    fn run_step(
        &self,
        module: &OdooModule,
        rules: &CompiledRules,
        diagnostics: &mut Aggregator,
    ) -> Result<(), EngineError> {
        let before = diagnostics.counts();
        let io = TextIo::new();

        let snapshot: Vec<PathBuf> = module
            .files()?
            .into_iter()
            .filter(|file| self.is_candidate(rules, file))
            .collect();

        let executor = TextRuleExecutor::new(rules, io);
        let mut files = Vec::with_capacity(snapshot.len());
        for file in snapshot {
            match executor.run_file(module, &file, diagnostics) {
                Ok(current) => files.push(current),
                Err(error) => {
                    diagnostics.error(
                        format!("Failed to apply text rules: {error}"),
                        Some(&module.relative(&file)),
                    );
                    files.push(file);
                }
            }
        }
        files.retain(|file| self.options.allows(&extension_of(file)));

        let manifest = module.manifest()?;
        let resolver = DeprecatedEntityResolver::new(rules.rules(), io);
        if let Err(error) = resolver.resolve(module, &manifest, &files, diagnostics) {
            diagnostics.error(
                format!("Failed to resolve deprecated entities: {error}"),
                Some(&module.relative(&manifest)),
            );
        }

        for name in rules.rules().structural_rewriters() {
            let Some(rewriter) = self.registry.get(name) else {
                continue;
            };
            let mut context = RewriteContext::new(
                module,
                manifest.clone(),
                &self.path,
                rules.step(),
                &self.options,
                diagnostics,
            );
            let outcome = rewriter.rewrite(&mut context);
            if let Err(error) = outcome {
                tracing::warn!(
                    target: DRIVER_TARGET,
                    event = "rewriter_failed",
                    module = module.name(),
                    step = %rules.step(),
                    rewriter = name.as_str(),
                    error = %error,
                    "rewriter stopped early"
                );
                diagnostics.error(format!("Rewriter '{name}' failed: {error}"), None);
            }
        }

        let counts = diagnostics.counts().since(before);
        tracing::info!(
            target: DRIVER_TARGET,
            event = "step_finished",
            module = module.name(),
            step = %rules.step(),
            info = counts.info,
            warnings = counts.warning,
            errors = counts.error,
            "step finished"
        );
        Ok(())
    }

    /// Whether the step may touch `file`, judged by its extension before or
    /// after a rename.
    fn is_candidate(&self, rules: &CompiledRules, file: &Path) -> bool {
        if self.options.allows(&extension_of(file)) {
            return true;
        }
        file.file_name()
            .and_then(OsStr::to_str)
            .and_then(|name| rules.renamed(name))
            .is_some_and(|renamed| self.options.allows(&extension_of(Path::new(renamed))))
    }
}
