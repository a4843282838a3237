//! Rendering of module reports.

use std::io::{self, Write};

use clap::ValueEnum;
use migrator_engine::{ModuleReport, Severity};

/// How module reports are written to stdout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Grouped, indented lines for people.
    #[default]
    Human,
    /// One JSON document per module and line.
    Json,
}

/// Writes `report` in `format`.
///
/// # Errors
///
/// Returns the writer's error when output fails.
pub fn render_report<W>(report: &ModuleReport, format: OutputFormat, out: &mut W) -> io::Result<()>
where
    W: Write,
{
    match format {
        OutputFormat::Human => render_human(report, out),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, report).map_err(io::Error::from)?;
            out.write_all(b"\n")
        }
    }
}

fn render_human<W>(report: &ModuleReport, out: &mut W) -> io::Result<()>
where
    W: Write,
{
    if report.entries().is_empty() {
        return writeln!(out, "Module '{}': no findings", report.module());
    }

    writeln!(out, "Module '{}': {}", report.module(), summary(report))?;
    for entry in report.entries() {
        writeln!(out, "  [{}] {}", entry.severity(), entry.message())?;
        for file in entry.files() {
            writeln!(out, "      {file}")?;
        }
    }
    Ok(())
}

fn summary(report: &ModuleReport) -> String {
    let count = |severity: Severity| {
        report
            .entries()
            .iter()
            .filter(|entry| entry.severity() == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);
    let info = count(Severity::Info);
    format!(
        "{errors} {}, {warnings} {}, {info} info",
        plural(errors, "error", "errors"),
        plural(warnings, "warning", "warnings"),
    )
}

const fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
