//! Version catalog and migration path resolution.
//!
//! The catalog is an ordered list of adjacent version steps. A migration path
//! is the contiguous run of catalog steps between the requested initial and
//! target versions, followed by one terminal step that always runs.

use std::fmt;

use crate::error::RulesError;

/// A framework release known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    ordinal: u16,
    name: &'static str,
    code: &'static str,
}

impl Version {
    /// Builds a version from its ordinal, display name and technical code.
    #[must_use]
    pub const fn new(ordinal: u16, name: &'static str, code: &'static str) -> Self {
        Self {
            ordinal,
            name,
            code,
        }
    }

    /// Comparable ordinal, e.g. `160` for `16.0`.
    #[must_use]
    pub const fn ordinal(self) -> u16 {
        self.ordinal
    }

    /// User-facing name, e.g. `16.0`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Technical code, e.g. `160`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        self.code
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One adjacent version-to-version step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionStep {
    init: Version,
    target: Version,
}

impl VersionStep {
    /// Builds a step between two versions.
    #[must_use]
    pub const fn new(init: Version, target: Version) -> Self {
        Self { init, target }
    }

    /// Version migrated from.
    #[must_use]
    pub const fn init(self) -> Version {
        self.init
    }

    /// Version migrated to.
    #[must_use]
    pub const fn target(self) -> Version {
        self.target
    }
}

impl fmt::Display for VersionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.init, self.target)
    }
}

/// A step of a resolved migration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// A catalog step.
    Versioned(VersionStep),
    /// The terminal step that runs on every migration.
    Always,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned(step) => step.fmt(f),
            Self::Always => f.write_str("always"),
        }
    }
}

const ODOO_VERSIONS: [Version; 12] = [
    Version::new(80, "8.0", "080"),
    Version::new(90, "9.0", "090"),
    Version::new(100, "10.0", "100"),
    Version::new(110, "11.0", "110"),
    Version::new(120, "12.0", "120"),
    Version::new(130, "13.0", "130"),
    Version::new(140, "14.0", "140"),
    Version::new(150, "15.0", "150"),
    Version::new(160, "16.0", "160"),
    Version::new(170, "17.0", "170"),
    Version::new(180, "18.0", "180"),
    Version::new(190, "19.0", "190"),
];

/// Ordered list of the version steps the migrator can perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCatalog {
    steps: Vec<VersionStep>,
}

impl VersionCatalog {
    /// Builds a catalog from ordered, adjacent steps.
    #[must_use]
    pub const fn new(steps: Vec<VersionStep>) -> Self {
        Self { steps }
    }

    /// The Odoo catalog, from 8.0 to 19.0.
    #[must_use]
    pub fn odoo() -> Self {
        let steps = ODOO_VERSIONS
            .windows(2)
            .filter_map(|pair| match pair {
                [init, target] => Some(VersionStep::new(*init, *target)),
                _ => None,
            })
            .collect();
        Self { steps }
    }

    /// All catalog steps in order.
    #[must_use]
    pub fn steps(&self) -> &[VersionStep] {
        &self.steps
    }

    /// Looks up a version by name (`16.0`) or code (`160`).
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnknownVersion`] when no step mentions the label.
    pub fn version(&self, label: &str) -> Result<Version, RulesError> {
        self.steps
            .iter()
            .flat_map(|step| [step.init, step.target])
            .find(|version| version.name == label || version.code == label)
            .ok_or_else(|| RulesError::unknown_version(label))
    }

    /// The newest version reachable through the catalog.
    #[must_use]
    pub fn latest(&self) -> Option<Version> {
        self.steps.last().map(|step| step.target)
    }
}

/// An immutable, resolved sequence of steps for one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPath {
    versioned: Vec<VersionStep>,
}

impl MigrationPath {
    /// Resolves the steps leading from `init` to `target`.
    ///
    /// The walk starts at the first catalog step whose initial version is
    /// `init` and accumulates steps until one reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::UnresolvablePath`] when `init` starts no step or
    /// `target` is never reached.
    pub fn resolve(catalog: &VersionCatalog, init: &str, target: &str) -> Result<Self, RulesError> {
        let unresolvable = || RulesError::UnresolvablePath {
            init: init.to_owned(),
            target: target.to_owned(),
        };

        let start = catalog
            .steps
            .iter()
            .position(|step| step.init.name == init)
            .ok_or_else(unresolvable)?;

        let mut versioned = Vec::new();
        for step in catalog.steps.iter().skip(start) {
            versioned.push(*step);
            if step.target.name == target {
                return Ok(Self { versioned });
            }
        }
        Err(unresolvable())
    }

    /// The version the module starts from.
    #[must_use]
    pub fn init(&self) -> Option<Version> {
        self.versioned.first().map(|step| step.init)
    }

    /// The version the module ends at.
    #[must_use]
    pub fn target(&self) -> Option<Version> {
        self.versioned.last().map(|step| step.target)
    }

    /// The catalog steps, without the terminal step.
    #[must_use]
    pub fn versioned(&self) -> &[VersionStep] {
        &self.versioned
    }

    /// Every step to run, in order, ending with [`PathStep::Always`].
    #[must_use]
    pub fn steps(&self) -> Vec<PathStep> {
        self.versioned
            .iter()
            .copied()
            .map(PathStep::Versioned)
            .chain(std::iter::once(PathStep::Always))
            .collect()
    }

    /// The first catalog step whose target is newer than `since`.
    #[must_use]
    pub fn first_step_after(&self, since: Version) -> Option<VersionStep> {
        self.versioned
            .iter()
            .copied()
            .find(|step| step.target.ordinal > since.ordinal)
    }
}
