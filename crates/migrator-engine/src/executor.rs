//! Text rule execution: file renames, ordered regex substitutions and
//! pattern-triggered diagnostics.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use migrator_rules::{ANY_EXTENSION, PathStep, RuleSet, RulesError, StepRules};
use regex::Regex;

use crate::diagnostics::Aggregator;
use crate::error::EngineError;
use crate::module::{OdooModule, extension_of};
use crate::textio::TextIo;

const EXECUTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");

/// Message recorded for files that cannot be decoded as UTF-8.
pub const NOT_UTF8_MESSAGE: &str = "Skipped file that is not valid UTF-8";

#[derive(Debug, Default)]
struct CompiledExtension {
    replacements: Vec<(Regex, String)>,
    errors: Vec<(Regex, String)>,
    warnings: Vec<(Regex, String)>,
}

/// A step's rule set with every pattern compiled, ready to run on files.
#[derive(Debug)]
pub struct CompiledRules {
    step: PathStep,
    rules: RuleSet,
    fallback: CompiledExtension,
    by_extension: HashMap<String, CompiledExtension>,
}

impl CompiledRules {
    /// Compiles the patterns of `step_rules` for every declared extension.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::InvalidPattern`] when a pattern does not
    /// compile.
    pub fn compile(step_rules: &StepRules) -> Result<Self, RulesError> {
        let rules = step_rules.rules().clone();
        let origin = format!("step {}", step_rules.step());

        let extensions: IndexSet<&str> = [
            rules.text_replacements(),
            rules.text_errors(),
            rules.text_warnings(),
        ]
        .into_iter()
        .flat_map(|collection| collection.keys().map(String::as_str))
        .filter(|extension| *extension != ANY_EXTENSION)
        .collect();

        let fallback = compile_extension(&rules, ANY_EXTENSION, &origin)?;
        let mut by_extension = HashMap::new();
        for extension in extensions {
            by_extension.insert(
                extension.to_owned(),
                compile_extension(&rules, extension, &origin)?,
            );
        }

        Ok(Self {
            step: step_rules.step(),
            rules,
            fallback,
            by_extension,
        })
    }

    /// The step these rules belong to.
    #[must_use]
    pub const fn step(&self) -> PathStep {
        self.step
    }

    /// The uncompiled rule set.
    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns the name `file_name` is renamed to in this step, if any.
    #[must_use]
    pub fn renamed(&self, file_name: &str) -> Option<&str> {
        self.rules
            .rename_for(file_name)
            .filter(|renamed| *renamed != file_name)
    }

    fn for_extension(&self, extension: &str) -> &CompiledExtension {
        self.by_extension.get(extension).unwrap_or(&self.fallback)
    }
}

fn compile_extension(
    rules: &RuleSet,
    extension: &str,
    origin: &str,
) -> Result<CompiledExtension, RulesError> {
    Ok(CompiledExtension {
        replacements: compile_pairs(rules.replacements_for(extension), origin)?,
        errors: compile_pairs(rules.errors_for(extension), origin)?,
        warnings: compile_pairs(rules.warnings_for(extension), origin)?,
    })
}

fn compile_pairs(pairs: Vec<(&str, &str)>, origin: &str) -> Result<Vec<(Regex, String)>, RulesError> {
    pairs
        .into_iter()
        .map(|(pattern, value)| {
            Regex::new(pattern)
                .map(|regex| (regex, value.to_owned()))
                .map_err(|error| RulesError::InvalidPattern {
                    origin: origin.to_owned(),
                    pattern: pattern.to_owned(),
                    message: error.to_string(),
                })
        })
        .collect()
}

/// Runs a step's text rules against single files.
#[derive(Debug, Clone, Copy)]
pub struct TextRuleExecutor<'r> {
    rules: &'r CompiledRules,
    io: TextIo,
}

impl<'r> TextRuleExecutor<'r> {
    /// Creates an executor for `rules`.
    #[must_use]
    pub const fn new(rules: &'r CompiledRules, io: TextIo) -> Self {
        Self { rules, io }
    }

    /// Renames, rewrites and scans one file.
    ///
    /// The rename happens first and every later stage addresses the new
    /// name, including the extension used to pick the rules. Returns the
    /// path the file lives at afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when the file cannot be renamed, read or
    /// written. Files that are not UTF-8 yield a warning diagnostic instead.
    pub fn run_file(
        &self,
        module: &OdooModule,
        path: &Path,
        diagnostics: &mut Aggregator,
    ) -> Result<PathBuf, EngineError> {
        let current = self.rename(module, path, diagnostics)?;
        let relative = module.relative(&current);
        let compiled = self.rules.for_extension(&extension_of(&current));

        let original = match self.io.read(&current) {
            Ok(text) => text,
            Err(EngineError::NotUtf8 { .. }) => {
                diagnostics.warning(NOT_UTF8_MESSAGE, Some(&relative));
                return Ok(current);
            }
            Err(error) => return Err(error),
        };

        let mut text = original.clone();
        for (pattern, replacement) in &compiled.replacements {
            text = pattern.replace_all(&text, replacement.as_str()).into_owned();
        }
        if self.io.write_if_changed(&current, &original, &text)? {
            tracing::info!(
                target: EXECUTOR_TARGET,
                event = "file_rewritten",
                module = module.name(),
                step = %self.rules.step(),
                file = %relative.display(),
                "applied text replacements"
            );
        }

        for (pattern, message) in &compiled.errors {
            if pattern.is_match(&text) {
                diagnostics.error(message.as_str(), Some(&relative));
            }
        }
        for (pattern, message) in &compiled.warnings {
            if pattern.is_match(&text) {
                diagnostics.warning(message.as_str(), Some(&relative));
            }
        }
        Ok(current)
    }

    fn rename(
        &self,
        module: &OdooModule,
        path: &Path,
        diagnostics: &mut Aggregator,
    ) -> Result<PathBuf, EngineError> {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return Ok(path.to_path_buf());
        };
        let Some(new_name) = self.rules.renamed(file_name) else {
            return Ok(path.to_path_buf());
        };
        let target = path.with_file_name(new_name);
        if target.exists() {
            diagnostics.error(
                format!("Cannot rename '{file_name}' to '{new_name}': the target already exists"),
                Some(&module.relative(path)),
            );
            return Ok(path.to_path_buf());
        }
        fs::rename(path, &target).map_err(|error| EngineError::io(path, error))?;
        tracing::info!(
            target: EXECUTOR_TARGET,
            event = "file_renamed",
            module = module.name(),
            step = %self.rules.step(),
            from = %module.relative(path).display(),
            to = %module.relative(&target).display(),
            "renamed file"
        );
        Ok(target)
    }
}
