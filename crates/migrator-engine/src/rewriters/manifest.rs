//! Rewriters that run on every migration and touch the module as a whole.

use std::fs;

use migrator_rules::ScopeSpec;

use super::{RewriteContext, Rewriter, compile};
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::EngineError;

/// Marks the manifest `installable` again.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetModuleInstallable;

impl Rewriter for SetModuleInstallable {
    fn name(&self) -> &'static str {
        "set_module_installable"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::always()
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let pattern = compile(r#"(['"])installable(['"]).*(False)"#)?;
        context
            .io()
            .replace_in_file(context.manifest(), &pattern, "${1}installable${2}: True")?;
        Ok(())
    }
}

/// Sets the manifest version to `<target>.1.0.0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BumpVersion;

impl Rewriter for BumpVersion {
    fn name(&self) -> &'static str {
        "bump_version"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::always()
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let Some(target) = context.path().target() else {
            return Ok(());
        };
        let pattern = compile(r#"(['"])version(['"]).*(['"]).*(['"])"#)?;
        let replacement = format!(r#"${{1}}version${{2}}: "{}.1.0.0""#, target.name());
        context
            .io()
            .replace_in_file(context.manifest(), &pattern, &replacement)?;
        Ok(())
    }
}

/// Deletes the module's `migrations` directory when the run allows it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveMigrationFolder;

impl Rewriter for RemoveMigrationFolder {
    fn name(&self) -> &'static str {
        "remove_migration_folder"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::always()
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        if !context.options().remove_migration_folder() {
            return Ok(());
        }
        let folder = context.module().root().join("migrations");
        if !folder.is_dir() {
            return Ok(());
        }
        fs::remove_dir_all(&folder).map_err(|error| EngineError::io(&folder, error))?;
        context.record(Diagnostic::new(
            Severity::Info,
            "Removed the 'migrations' folder",
        ));
        Ok(())
    }
}
