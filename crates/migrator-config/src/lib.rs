//! Layered configuration for the Odoo module migrator.
//!
//! Values resolve from built-in defaults, then a configuration file, then
//! `ODOO_MIGRATE_*` environment variables, then command-line flags. The
//! loader is generated by `ortho_config`; only run-wide settings live here,
//! while the migration request itself (directory, modules, versions) is
//! parsed by the CLI.

mod defaults;
mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CATALOG_TIMEOUT_SECS, DEFAULT_LOG_FILTER, default_catalog_timeout_secs,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Run-wide migrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ODOO_MIGRATE")]
pub struct Config {
    /// `tracing` filter expression, e.g. `info` or `migrator_engine=debug`.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Directory of additional YAML rule files.
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,
    /// Base URL of the remote change catalog; unset disables lookups.
    #[serde(default)]
    pub catalog_url: Option<String>,
    /// Seconds a catalog request may take.
    #[ortho_config(default = default_catalog_timeout_secs())]
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,
    /// Deletes each module's `migrations` folder.
    #[serde(default)]
    pub remove_migration_folder: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            rules_dir: None,
            catalog_url: None,
            catalog_timeout_secs: default_catalog_timeout_secs(),
            remove_migration_folder: false,
        }
    }
}

impl Config {
    /// The `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// The log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The user rule directory, if configured.
    #[must_use]
    pub fn rules_dir(&self) -> Option<&Path> {
        self.rules_dir.as_deref()
    }

    /// The remote catalog base URL, if configured.
    #[must_use]
    pub fn catalog_url(&self) -> Option<&str> {
        self.catalog_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// How long a catalog request may take.
    #[must_use]
    pub const fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    /// Whether `migrations` folders are deleted.
    #[must_use]
    pub const fn remove_migration_folder(&self) -> bool {
        self.remove_migration_folder
    }
}
