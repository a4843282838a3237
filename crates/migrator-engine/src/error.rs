//! Error types for the migration engine.
//!
//! Only configuration problems and I/O failures surface as errors. Problems
//! found in module code are reported as diagnostics instead.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use migrator_rules::RulesError;
use migrator_syntax::{PatchError, SyntaxError};
use thiserror::Error;

/// Failures raised by the migration engine.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The requested module directory does not exist.
    #[error("module '{name}' not found in {}", directory.display())]
    ModuleNotFound {
        /// Module name.
        name: String,
        /// Directory searched.
        directory: PathBuf,
    },

    /// No manifest file exists in the module root.
    #[error("no manifest found in {}", root.display())]
    ManifestNotFound {
        /// Module root.
        root: PathBuf,
    },

    /// A step names a structural rewriter that is not registered.
    #[error("unknown structural rewriter '{name}' required by step {step}")]
    UnknownRewriter {
        /// Requested rewriter name.
        name: String,
        /// Step that requested it.
        step: String,
    },

    /// Rules could not be compiled.
    #[error(transparent)]
    Rules(#[from] RulesError),

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The affected path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: Arc<io::Error>,
    },

    /// A file is not valid UTF-8.
    #[error("{} is not valid UTF-8", path.display())]
    NotUtf8 {
        /// The affected path.
        path: PathBuf,
    },

    /// A rewriter produced edits that could not be applied.
    #[error("failed to apply edits: {0}")]
    Patch(#[from] PatchError),

    /// The parser could not be initialised.
    #[error(transparent)]
    Syntax(#[from] Arc<SyntaxError>),
}

impl EngineError {
    /// Wraps an I/O failure for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl From<SyntaxError> for EngineError {
    fn from(error: SyntaxError) -> Self {
        Self::Syntax(Arc::new(error))
    }
}
