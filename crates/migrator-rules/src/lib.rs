//! Rule model, version paths and rule compilation for the module migrator.
//!
//! The crate turns a requested version pair into a [`MigrationPath`] and
//! compiles one [`RuleSet`] per step of that path from several kinds of
//! [`FragmentSource`]:
//!
//! - the [`BuiltinRules`] tables bundled with the tool;
//! - user rule files read by [`RuleDirectory`];
//! - fragments registered in code through [`StaticSource`];
//! - an optional [`ChangeCatalog`], queried once per versioned step.
//!
//! Compilation is deterministic and validates every pattern, so a
//! configuration error surfaces before any module file is modified.

mod catalog;
mod compiler;
mod error;
mod fragment;
mod ruleset;
mod source;
mod version;

pub use catalog::{
    ChangeCatalog, ChangeRecord, ChangeType, EntityType, HttpChangeCatalog, normalize,
    quoted_pattern,
};
pub use compiler::{RuleSetCompiler, StepRules};
pub use error::{CatalogError, RulesError};
pub use fragment::{
    ANY_EXTENSION, DeprecatedModule, DeprecationAction, RemovedField, RemovedModel, RenamedField,
    RenamedModel, RuleFragment, ScopeSpec, ScopedFragment, StepScope, TextCheck, TextReplacement,
};
pub use ruleset::{OrderingHazard, PatternMap, RuleSet};
pub use source::{BuiltinRules, FragmentSource, RuleDirectory, SourceKind, StaticSource};
pub use version::{MigrationPath, PathStep, Version, VersionCatalog, VersionStep};

#[cfg(test)]
mod tests;
