//! Migration engine for Odoo addon modules.
//!
//! The engine applies the compiled rules of each step of a migration path
//! to a module on disk. A step runs, in order, the [`TextRuleExecutor`]
//! (renames, regex substitutions, pattern diagnostics), the
//! [`DeprecatedEntityResolver`] (manifest dependencies, removed and renamed
//! fields and models) and the structural [`Rewriter`]s the step names.
//! Every finding lands in one [`Aggregator`] per module, which produces the
//! grouped [`ModuleReport`].
//!
//! [`Migration`] is the entry point: it is prepared once per run and then
//! migrates any number of modules.

mod diagnostics;
mod driver;
mod error;
mod executor;
mod module;
mod report;
mod resolver;
pub mod rewriters;
mod textio;

pub use diagnostics::{Aggregator, Diagnostic, Severity, SeverityCounts};
pub use driver::{DEFAULT_EXTENSIONS, Migration, MigrationOptions};
pub use error::EngineError;
pub use executor::{CompiledRules, NOT_UTF8_MESSAGE, TextRuleExecutor};
pub use module::{MANIFEST_NAMES, OdooModule, discover_modules, extension_of};
pub use report::{ModuleReport, ReportEntry};
pub use resolver::DeprecatedEntityResolver;
pub use rewriters::{RewriteContext, Rewriter, RewriterRegistry};
pub use textio::TextIo;

#[cfg(test)]
mod tests;
