//! Command-line arguments describing one migration run.

use std::path::PathBuf;

use clap::Parser;

use crate::output::OutputFormat;

const CONFIG_HELP: &str = "\
Configuration flags (also read from ODOO_MIGRATE_* variables and --config-path):
      --log-filter <FILTER>           tracing filter, default 'info'
      --log-format <json|compact>     log output format, default 'json'
      --rules-dir <DIR>               directory of additional YAML rule files
      --catalog-url <URL>             remote change catalog base URL
      --catalog-timeout-secs <SECS>   catalog request timeout, default 5
      --remove-migration-folder       delete each module's 'migrations' folder";

/// Migrates Odoo addon modules from one major version to another.
#[derive(Parser, Debug)]
#[command(name = "odoo-migrate", version, after_help = CONFIG_HELP)]
pub(crate) struct Cli {
    /// Directory holding the modules to migrate.
    #[arg(short = 'd', long, value_name = "DIR", default_value = "./")]
    pub(crate) directory: PathBuf,
    /// Comma-separated module names; every module of the directory when
    /// omitted.
    #[arg(short = 'm', long, value_name = "MODULES")]
    pub(crate) modules: Option<String>,
    /// Version the modules are written for, e.g. `12.0`.
    #[arg(short = 'i', long, value_name = "VERSION")]
    pub(crate) init_version_name: String,
    /// Version to migrate to; the newest known version when omitted.
    #[arg(short = 't', long, value_name = "VERSION")]
    pub(crate) target_version_name: Option<String>,
    /// Exits successfully even when a report contains errors.
    #[arg(long)]
    pub(crate) no_fail_on_error: bool,
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub(crate) output: OutputFormat,
    /// Logs the migrator's own events in more detail; repeat for trace.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
}

impl Cli {
    /// Module names from `--modules`, trimmed, without empty entries.
    pub(crate) fn module_names(&self) -> Vec<String> {
        self.modules
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
