//! Diagnostics and their per-module aggregation.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::report::{ModuleReport, ReportEntry};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Something was changed automatically.
    Info,
    /// Something was changed or detected and should be reviewed.
    Warning,
    /// Something needs manual work.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One finding about a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    message: String,
    file: Option<PathBuf>,
}

impl Diagnostic {
    /// Builds a diagnostic not tied to a file.
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
        }
    }

    /// Attaches the file, relative to the module root, the finding is about.
    #[must_use]
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Message text; diagnostics are grouped by it.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// File the finding is about, if any.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// Diagnostic totals per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    /// Number of info diagnostics.
    pub info: usize,
    /// Number of warning diagnostics.
    pub warning: usize,
    /// Number of error diagnostics.
    pub error: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warning += 1,
            Severity::Error => self.error += 1,
        }
    }

    /// Counts recorded since `earlier` was taken.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self {
            info: self.info.saturating_sub(earlier.info),
            warning: self.warning.saturating_sub(earlier.warning),
            error: self.error.saturating_sub(earlier.error),
        }
    }
}

#[derive(Debug)]
struct Group {
    severity: Severity,
    files: BTreeSet<PathBuf>,
}

/// Collects the diagnostics of one module across every step.
///
/// Diagnostics sharing a message collapse into one group listing every
/// affected file. Groups keep the order in which their message was first
/// seen; a group's severity is the highest it was recorded at.
#[derive(Debug)]
pub struct Aggregator {
    module: String,
    groups: IndexMap<String, Group>,
    counts: SeverityCounts,
}

impl Aggregator {
    /// Creates an empty aggregator for `module`.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            groups: IndexMap::new(),
            counts: SeverityCounts::default(),
        }
    }

    /// Records a diagnostic and mirrors it as a tracing event.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        let file = diagnostic
            .file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        match diagnostic.severity {
            Severity::Info => tracing::info!(
                target: "migrator_engine::diagnostics",
                event = "diagnostic",
                module = %self.module,
                file = %file,
                "{}",
                diagnostic.message
            ),
            Severity::Warning => tracing::warn!(
                target: "migrator_engine::diagnostics",
                event = "diagnostic",
                module = %self.module,
                file = %file,
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                target: "migrator_engine::diagnostics",
                event = "diagnostic",
                module = %self.module,
                file = %file,
                "{}",
                diagnostic.message
            ),
        }

        self.counts.add(diagnostic.severity);
        let group = self
            .groups
            .entry(diagnostic.message)
            .or_insert_with(|| Group {
                severity: diagnostic.severity,
                files: BTreeSet::new(),
            });
        group.severity = group.severity.max(diagnostic.severity);
        if let Some(file) = diagnostic.file {
            group.files.insert(file);
        }
    }

    /// Records an info diagnostic.
    pub fn info(&mut self, message: impl Into<String>, file: Option<&Path>) {
        self.record(with_file(Diagnostic::new(Severity::Info, message), file));
    }

    /// Records a warning diagnostic.
    pub fn warning(&mut self, message: impl Into<String>, file: Option<&Path>) {
        self.record(with_file(Diagnostic::new(Severity::Warning, message), file));
    }

    /// Records an error diagnostic.
    pub fn error(&mut self, message: impl Into<String>, file: Option<&Path>) {
        self.record(with_file(Diagnostic::new(Severity::Error, message), file));
    }

    /// Totals recorded so far.
    #[must_use]
    pub const fn counts(&self) -> SeverityCounts {
        self.counts
    }

    /// Name of the module being aggregated.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Builds the grouped report.
    #[must_use]
    pub fn into_report(self) -> ModuleReport {
        let entries = self
            .groups
            .into_iter()
            .map(|(message, group)| {
                ReportEntry::new(
                    message,
                    group.severity,
                    group
                        .files
                        .iter()
                        .map(|path| path.display().to_string())
                        .collect(),
                )
            })
            .collect();
        ModuleReport::new(self.module, entries)
    }
}

fn with_file(diagnostic: Diagnostic, file: Option<&Path>) -> Diagnostic {
    match file {
        Some(path) => diagnostic.in_file(path),
        None => diagnostic,
    }
}
