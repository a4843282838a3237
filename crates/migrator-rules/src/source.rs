//! Providers of rule fragments.
//!
//! Each source yields scoped fragments for the compiler. Sources are
//! ordered by [`SourceKind`] so that later kinds take precedence for
//! dictionary-style rules.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::RulesError;
use crate::fragment::ScopedFragment;
use crate::version::VersionCatalog;

/// Precedence class of a fragment source. Later variants win conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Rule files shipped with the tool or loaded from a directory.
    Declarative,
    /// Fragments built in code and registered on the compiler.
    Registered,
    /// Fragments normalised from the remote change catalog.
    Remote,
}

/// Produces rule fragments.
pub trait FragmentSource {
    /// Precedence class of every fragment this source produces.
    fn kind(&self) -> SourceKind;

    /// Loads every fragment, resolving scopes against `catalog`.
    ///
    /// # Errors
    ///
    /// Returns a [`RulesError`] when a fragment cannot be read or decoded.
    fn load(&self, catalog: &VersionCatalog) -> Result<Vec<ScopedFragment>, RulesError>;
}

const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("always", include_str!("../rules/always.yaml")),
    ("since_080", include_str!("../rules/since_080.yaml")),
    ("since_100", include_str!("../rules/since_100.yaml")),
    ("since_150", include_str!("../rules/since_150.yaml")),
    ("step_080_090", include_str!("../rules/step_080_090.yaml")),
    ("step_090_100", include_str!("../rules/step_090_100.yaml")),
    ("step_100_110", include_str!("../rules/step_100_110.yaml")),
    ("step_110_120", include_str!("../rules/step_110_120.yaml")),
    ("step_120_130", include_str!("../rules/step_120_130.yaml")),
    ("step_130_140", include_str!("../rules/step_130_140.yaml")),
    ("step_150_160", include_str!("../rules/step_150_160.yaml")),
    ("step_160_170", include_str!("../rules/step_160_170.yaml")),
];

/// The rule tables compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRules;

impl BuiltinRules {
    /// Names of the bundled tables.
    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTIN_TABLES.iter().map(|(name, _)| *name)
    }
}

impl FragmentSource for BuiltinRules {
    fn kind(&self) -> SourceKind {
        SourceKind::Declarative
    }

    fn load(&self, catalog: &VersionCatalog) -> Result<Vec<ScopedFragment>, RulesError> {
        BUILTIN_TABLES
            .iter()
            .map(|(name, text)| ScopedFragment::from_yaml(catalog, &format!("builtin:{name}"), text))
            .collect()
    }
}

/// Rule files read from a directory tree.
///
/// Every `*.yaml` or `*.yml` file below the root is one fragment. Files are
/// visited in path order.
#[derive(Debug, Clone)]
pub struct RuleDirectory {
    root: PathBuf,
}

impl RuleDirectory {
    /// Reads fragments below `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory being read.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn rule_files(&self) -> Result<Vec<PathBuf>, RulesError> {
        let mut files = Vec::new();
        for walked in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = walked.map_err(|error| {
                let path = error
                    .path()
                    .map_or_else(|| self.root.clone(), Path::to_path_buf);
                RulesError::io(path, error.into())
            })?;
            let is_rule_file = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|extension| extension.to_str())
                    .is_some_and(|extension| matches!(extension, "yaml" | "yml"));
            if is_rule_file {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

impl FragmentSource for RuleDirectory {
    fn kind(&self) -> SourceKind {
        SourceKind::Declarative
    }

    fn load(&self, catalog: &VersionCatalog) -> Result<Vec<ScopedFragment>, RulesError> {
        let files = self.rule_files()?;
        tracing::debug!(
            target: "migrator_rules::source",
            event = "rules.directory.scanned",
            root = %self.root.display(),
            files = files.len(),
            "scanned rule directory"
        );
        files
            .iter()
            .map(|path| {
                let text = fs::read_to_string(path).map_err(|error| RulesError::io(path, error))?;
                ScopedFragment::from_yaml(catalog, &path.display().to_string(), &text)
            })
            .collect()
    }
}

/// A fixed list of fragments, typically built in code.
#[derive(Debug, Clone)]
pub struct StaticSource {
    kind: SourceKind,
    fragments: Vec<ScopedFragment>,
}

impl StaticSource {
    /// Wraps `fragments` under the given precedence class.
    #[must_use]
    pub const fn new(kind: SourceKind, fragments: Vec<ScopedFragment>) -> Self {
        Self { kind, fragments }
    }

    /// Wraps fragments registered programmatically.
    #[must_use]
    pub const fn registered(fragments: Vec<ScopedFragment>) -> Self {
        Self::new(SourceKind::Registered, fragments)
    }
}

impl FragmentSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn load(&self, _catalog: &VersionCatalog) -> Result<Vec<ScopedFragment>, RulesError> {
        Ok(self.fragments.clone())
    }
}
