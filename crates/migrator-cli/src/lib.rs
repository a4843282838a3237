//! Command-line runtime for the Odoo module migrator.
//!
//! The runtime splits configuration flags from the migration request,
//! loads layered configuration, installs logging, prepares one
//! [`Migration`] and writes a report per module to stdout. Configuration
//! loading and the IO streams can be substituted so tests drive the whole
//! run in-process.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use migrator_config::Config;
use migrator_engine::{
    Migration, MigrationOptions, ModuleReport, OdooModule, RewriterRegistry, discover_modules,
};
use migrator_rules::{
    BuiltinRules, HttpChangeCatalog, RuleDirectory, RuleSetCompiler, VersionCatalog,
};

mod cli;
mod config;
mod errors;
pub mod output;
pub mod telemetry;

use cli::Cli;
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use errors::EXIT_REPORTED_ERRORS;
pub use output::{OutputFormat, render_report};

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::run");

/// Configuration flags that take a value.
///
/// MAINTENANCE: keep in sync with the fields of `migrator_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--rules-dir",
    "--catalog-url",
    "--catalog-timeout-secs",
];

/// Boolean configuration flags.
const CONFIG_SWITCHES: &[&str] = &["--remove-migration-folder"];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        match self.execute(&split) {
            Ok(exit_code) => exit_code,
            Err(error) => {
                tracing::error!(
                    target: CLI_TARGET,
                    event = "run_failed",
                    %error,
                    "migration run failed"
                );
                if let Err(write_error) = writeln!(self.io.stderr, "{error}") {
                    tracing::warn!(
                        target: CLI_TARGET,
                        event = "stderr_unavailable",
                        error = %write_error,
                        "could not report failure"
                    );
                }
                ExitCode::from(error.exit_code())
            }
        }
    }

    fn execute(&mut self, split: &ConfigArgumentSplit) -> Result<ExitCode, AppError> {
        let Some(cli) = self.parse(&split.command_arguments)? else {
            return Ok(ExitCode::SUCCESS);
        };
        let config = self.loader.load(&split.config_arguments)?;
        let logging = telemetry::initialise(&config, cli.verbose)?;
        tracing::debug!(
            target: CLI_TARGET,
            event = "run_started",
            directory = %cli.directory.display(),
            filter = logging.filter(),
            "starting migration run"
        );
        self.migrate(&cli, &config)
    }

    /// Parses the migration request; `None` when help or the version was
    /// printed instead.
    fn parse(&mut self, arguments: &[OsString]) -> Result<Option<Cli>, AppError> {
        match Cli::try_parse_from(arguments) {
            Ok(cli) => Ok(Some(cli)),
            Err(error)
                if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
            {
                write!(self.io.stdout, "{}", error.render()).map_err(AppError::WriteReport)?;
                Ok(None)
            }
            Err(error) => Err(AppError::CliUsage(error)),
        }
    }

    fn migrate(&mut self, cli: &Cli, config: &Config) -> Result<ExitCode, AppError> {
        let compiler = build_compiler(config);
        let target = cli
            .target_version_name
            .clone()
            .or_else(|| {
                compiler
                    .catalog()
                    .latest()
                    .map(|version| version.name().to_owned())
            })
            .ok_or(AppError::NoTargetVersion)?;
        let options =
            MigrationOptions::new().with_remove_migration_folder(config.remove_migration_folder());
        let migration = Migration::prepare(
            compiler,
            RewriterRegistry::builtin(),
            &cli.init_version_name,
            &target,
            options,
        )
        .map_err(AppError::Configuration)?;

        let names = self.select_modules(cli)?;
        if names.is_empty() {
            writeln!(
                self.io.stderr,
                "no Odoo modules found in {}",
                cli.directory.display()
            )
            .map_err(AppError::WriteReport)?;
            return Ok(ExitCode::SUCCESS);
        }

        let mut failed = 0usize;
        for name in &names {
            let report = migration
                .run_module(&cli.directory, name)
                .unwrap_or_else(|error| {
                    tracing::error!(
                        target: CLI_TARGET,
                        event = "module_failed",
                        module = name.as_str(),
                        %error,
                        "module could not be migrated"
                    );
                    ModuleReport::aborted(name, &error)
                });
            render_report(&report, cli.output, &mut *self.io.stdout)
                .map_err(AppError::WriteReport)?;
            if report.has_errors() {
                failed += 1;
            }
        }
        self.io.stdout.flush().map_err(AppError::WriteReport)?;

        tracing::info!(
            target: CLI_TARGET,
            event = "run_finished",
            modules = names.len(),
            failed,
            init = %cli.init_version_name,
            target = %target,
            "migration run finished"
        );
        if failed > 0 && !cli.no_fail_on_error {
            return Ok(ExitCode::from(EXIT_REPORTED_ERRORS));
        }
        Ok(ExitCode::SUCCESS)
    }

    /// Resolves the requested modules and checks that each one exists before
    /// any of them is touched.
    fn select_modules(&self, cli: &Cli) -> Result<Vec<String>, AppError> {
        let requested = cli.module_names();
        let names = if requested.is_empty() {
            discover_modules(&cli.directory).map_err(AppError::Configuration)?
        } else {
            requested
        };
        for name in &names {
            OdooModule::open(&cli.directory, name).map_err(AppError::Configuration)?;
        }
        Ok(names)
    }
}

fn build_compiler(config: &Config) -> RuleSetCompiler {
    let mut compiler = RuleSetCompiler::new(VersionCatalog::odoo()).with_source(BuiltinRules);
    if let Some(rules_dir) = config.rules_dir() {
        compiler = compiler.with_source(RuleDirectory::new(rules_dir));
    }
    if let Some(url) = config.catalog_url() {
        compiler = compiler.with_catalog(HttpChangeCatalog::new(url, config.catalog_timeout()));
    }
    compiler
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

#[cfg(test)]
mod tests;
