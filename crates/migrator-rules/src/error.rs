//! Error types for rule loading, path resolution and compilation.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Configuration errors raised before any module file is touched.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RulesError {
    /// A version label is not part of the catalog.
    #[error("unknown version '{name}'")]
    UnknownVersion {
        /// The label that was not recognised.
        name: String,
    },

    /// No contiguous run of catalog steps leads from `init` to `target`.
    #[error("no migration path from version '{init}' to version '{target}'")]
    UnresolvablePath {
        /// Requested initial version.
        init: String,
        /// Requested target version.
        target: String,
    },

    /// A rule fragment could not be decoded or declares an invalid scope.
    #[error("invalid rule fragment {origin}: {message}")]
    InvalidFragment {
        /// Where the fragment came from.
        origin: String,
        /// Description of the problem.
        message: String,
    },

    /// A regular expression in a rule does not compile.
    #[error("invalid pattern '{pattern}' in {origin}: {message}")]
    InvalidPattern {
        /// Where the rule came from.
        origin: String,
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// Reading a rule file or directory failed.
    #[error("failed to read rules at {}: {source}", path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

impl RulesError {
    /// Creates an invalid fragment error.
    #[must_use]
    pub fn invalid_fragment(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFragment {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown version error.
    #[must_use]
    pub fn unknown_version(name: impl Into<String>) -> Self {
        Self::UnknownVersion { name: name.into() }
    }

    /// Wraps an I/O failure for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Failures talking to the remote change catalog.
///
/// These never abort a run; the compiler logs them and proceeds without
/// remote rules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// The service could not be reached or answered with an error status.
    #[error("change catalog request to {url} failed: {message}")]
    Unavailable {
        /// Requested URL.
        url: String,
        /// Transport or status description.
        message: String,
    },

    /// The service answered with a body that is not a list of change records.
    #[error("change catalog returned a malformed body from {url}: {message}")]
    MalformedResponse {
        /// Requested URL.
        url: String,
        /// Decoder diagnostic.
        message: String,
    },
}
