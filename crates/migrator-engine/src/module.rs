//! Module discovery and layout.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::EngineError;

/// Manifest file names, in lookup order.
pub const MANIFEST_NAMES: [&str; 2] = ["__openerp__.py", "__manifest__.py"];

/// An addon module on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdooModule {
    name: String,
    root: PathBuf,
}

impl OdooModule {
    /// Opens the module `name` inside `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModuleNotFound`] when the directory is missing
    /// and [`EngineError::ManifestNotFound`] when it holds no manifest.
    pub fn open(directory: &Path, name: &str) -> Result<Self, EngineError> {
        let root = directory.join(name);
        if !root.is_dir() {
            return Err(EngineError::ModuleNotFound {
                name: name.to_owned(),
                directory: directory.to_path_buf(),
            });
        }
        let module = Self {
            name: name.to_owned(),
            root,
        };
        module.manifest()?;
        Ok(module)
    }

    /// Technical name of the module.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locates the manifest, trying each of [`MANIFEST_NAMES`] in turn.
    ///
    /// The lookup is repeated on every call because file renames move the
    /// manifest during a migration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ManifestNotFound`] when no manifest exists.
    pub fn manifest(&self) -> Result<PathBuf, EngineError> {
        find_manifest(&self.root).ok_or_else(|| EngineError::ManifestNotFound {
            root: self.root.clone(),
        })
    }

    /// Returns `path` relative to the module root, for reporting.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
    }

    /// Lists every file below the module root in path order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when a directory cannot be read.
    pub fn files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        for walked in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = walked.map_err(|error| {
                let path = error
                    .path()
                    .map_or_else(|| self.root.clone(), Path::to_path_buf);
                EngineError::io(path, error.into())
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Lists the files whose extension is one of `extensions`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when a directory cannot be read.
    pub fn files_with_extensions(&self, extensions: &[&str]) -> Result<Vec<PathBuf>, EngineError> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|path| extensions.contains(&extension_of(path).as_str()))
            .collect())
    }
}

fn find_manifest(root: &Path) -> Option<PathBuf> {
    MANIFEST_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|candidate| candidate.is_file())
}

/// Lists the modules of `directory`: every subdirectory holding a manifest,
/// sorted by name.
///
/// # Errors
///
/// Returns [`EngineError::Io`] when the directory cannot be read.
pub fn discover_modules(directory: &Path) -> Result<Vec<String>, EngineError> {
    let entries = fs::read_dir(directory).map_err(|error| EngineError::io(directory, error))?;
    let mut modules = Vec::new();
    for listed in entries {
        let entry = listed.map_err(|error| EngineError::io(directory, error))?;
        let path = entry.path();
        if path.is_dir() && find_manifest(&path).is_some() {
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                modules.push(name.to_owned());
            }
        }
    }
    modules.sort();
    Ok(modules)
}

/// Returns the extension of `path` with its leading dot, e.g. `.py`, or an
/// empty string.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| format!(".{extension}"))
        .unwrap_or_default()
}
