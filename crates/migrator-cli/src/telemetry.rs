//! Structured logging for migration runs.
//!
//! Events go to stderr so reports on stdout stay machine-readable. The
//! configured filter decides what is logged; `--verbose` raises the
//! migrator's own targets on top of it without touching third-party crates.

use std::io::{self, IsTerminal};

use migrator_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Prefix shared by the targets of every migrator crate.
const MIGRATOR_TARGET_PREFIX: &str = "migrator";

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED_FILTER: OnceCell<String> = OnceCell::new();

/// Describes the subscriber installed for the process.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    filter: &'static str,
}

impl TelemetryHandle {
    /// The filter expression the subscriber was installed with.
    #[must_use]
    pub const fn filter(&self) -> &'static str {
        self.filter
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The effective log filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected expression, including any verbosity directive.
        filter: String,
        /// Parser explanation.
        message: String,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Builds the filter expression for `configured` raised by `verbosity`.
///
/// One `-v` logs the migrator's targets at debug level, two or more at
/// trace level. Directives already present in `configured` are kept.
#[must_use]
pub fn effective_filter(configured: &str, verbosity: u8) -> String {
    let Some(level) = verbosity_level(verbosity) else {
        return configured.to_owned();
    };
    let raised = format!("{MIGRATOR_TARGET_PREFIX}={level}");
    if configured.trim().is_empty() {
        raised
    } else {
        format!("{configured},{raised}")
    }
}

const fn verbosity_level(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Installs the global subscriber for the first run in the process.
///
/// Later calls keep the subscriber installed first and return its handle,
/// so tests may drive the CLI repeatedly in one process.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the effective filter does not
/// parse and [`TelemetryError::Subscriber`] when another subscriber is
/// already installed.
pub fn initialise(config: &Config, verbosity: u8) -> Result<TelemetryHandle, TelemetryError> {
    let filter = INSTALLED_FILTER.get_or_try_init(|| {
        let expression = effective_filter(config.log_filter(), verbosity);
        install_subscriber(&expression, config.log_format())?;
        Ok::<_, TelemetryError>(expression)
    })?;
    tracing::debug!(
        target: TELEMETRY_TARGET,
        event = "telemetry_ready",
        filter = filter.as_str(),
        format = %config.log_format(),
        "logging configured"
    );
    Ok(TelemetryHandle {
        filter: filter.as_str(),
    })
}

/// Parses `expression` into an [`EnvFilter`].
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] naming the expression when it does
/// not parse.
pub fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn install_subscriber(expression: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let filter = parse_filter(expression)?;
    let interactive = io::stderr().is_terminal();
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(interactive)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().with_target(!interactive).finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
