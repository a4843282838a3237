//! CLI entrypoint for the Odoo module migrator.
//!
//! The binary delegates to [`migrator_cli::run`], which loads configuration,
//! parses the migration request, migrates the selected modules and prints
//! one report per module.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    migrator_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
