//! Shared text file helper used by the executors and rewriters.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use regex::{Captures, Regex};

use crate::error::EngineError;

const TEXTIO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::textio");

/// Reads and writes module files.
///
/// Writes go through a temporary file in the target's directory that is
/// persisted over the original, so an interrupted run never leaves a
/// half-written source file behind. The original's permissions are carried
/// over to the replacement.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextIo;

impl TextIo {
    /// Creates the helper.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reads `path` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotUtf8`] for binary or mis-encoded files and
    /// [`EngineError::Io`] when the file cannot be read.
    pub fn read(&self, path: &Path) -> Result<String, EngineError> {
        fs::read_to_string(path).map_err(|error| {
            if error.kind() == io::ErrorKind::InvalidData {
                EngineError::NotUtf8 {
                    path: path.to_path_buf(),
                }
            } else {
                EngineError::io(path, error)
            }
        })
    }

    /// Writes `content` to `path` unless it equals `original`.
    ///
    /// Returns whether the file was written.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when the temporary file cannot be created,
    /// written or persisted, or the original's permissions cannot be read.
    pub fn write_if_changed(
        &self,
        path: &Path,
        original: &str,
        content: &str,
    ) -> Result<bool, EngineError> {
        if original == content {
            return Ok(false);
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file =
            tempfile::NamedTempFile::new_in(parent).map_err(|error| EngineError::io(path, error))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|error| EngineError::io(path, error))?;
        if let Some(permissions) = existing_permissions(path)? {
            temp_file
                .as_file()
                .set_permissions(permissions)
                .map_err(|error| EngineError::io(path, error))?;
        }
        temp_file
            .persist(path)
            .map_err(|error| EngineError::io(path, error.error))?;
        tracing::debug!(
            target: TEXTIO_TARGET,
            event = "file_written",
            file = %path.display(),
            "file content updated"
        );
        Ok(true)
    }

    /// Applies one regex substitution to the file at `path`.
    ///
    /// Returns whether the file changed.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the file cannot be read or written.
    pub fn replace_in_file(
        &self,
        path: &Path,
        pattern: &Regex,
        replacement: &str,
    ) -> Result<bool, EngineError> {
        self.rewrite(path, |text| {
            pattern.replace_all(text, replacement).into_owned()
        })
    }

    /// Applies a regex substitution computed by `replacer` for every match.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the file cannot be read or written.
    pub fn replace_with(
        &self,
        path: &Path,
        pattern: &Regex,
        replacer: impl FnMut(&Captures<'_>) -> String,
    ) -> Result<bool, EngineError> {
        self.rewrite(path, |text| pattern.replace_all(text, replacer).into_owned())
    }

    /// Reads `path`, transforms its text and writes it back if it changed.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the file cannot be read or written.
    pub fn rewrite(
        &self,
        path: &Path,
        transform: impl FnOnce(&str) -> String,
    ) -> Result<bool, EngineError> {
        let original = self.read(path)?;
        let updated = transform(&original);
        let changed = self.write_if_changed(path, &original, &updated)?;
        if changed {
            tracing::info!(
                target: TEXTIO_TARGET,
                event = "file_rewritten",
                file = %path.display(),
                "rewrote file"
            );
        }
        Ok(changed)
    }
}

fn existing_permissions(path: &Path) -> Result<Option<fs::Permissions>, EngineError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(EngineError::io(path, error)),
    }
}
