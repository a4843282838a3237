//! Grouped per-module migration reports.

use serde::Serialize;

use crate::diagnostics::Severity;
use crate::error::EngineError;

/// One distinct message and the files it was reported for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    message: String,
    severity: Severity,
    files: Vec<String>,
}

impl ReportEntry {
    /// Builds an entry; `files` must already be sorted.
    #[must_use]
    pub const fn new(message: String, severity: Severity, files: Vec<String>) -> Self {
        Self {
            message,
            severity,
            files,
        }
    }

    /// Message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Highest severity the message was reported at.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Affected files relative to the module root, sorted.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Outcome of migrating one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    module: String,
    entries: Vec<ReportEntry>,
}

impl ModuleReport {
    /// Builds a report.
    #[must_use]
    pub const fn new(module: String, entries: Vec<ReportEntry>) -> Self {
        Self { module, entries }
    }

    /// Builds the report of a module whose migration could not start.
    #[must_use]
    pub fn aborted(module: &str, error: &EngineError) -> Self {
        Self::new(
            module.to_owned(),
            vec![ReportEntry::new(
                format!("Migration failed: {error}"),
                Severity::Error,
                Vec::new(),
            )],
        )
    }

    /// Module name.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Entries in first-seen order.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Returns whether any entry is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.severity == Severity::Error)
    }

    /// Finds the entry for `message`.
    #[must_use]
    pub fn entry(&self, message: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|entry| entry.message == message)
    }
}
