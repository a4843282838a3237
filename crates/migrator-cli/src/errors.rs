//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use migrator_engine::EngineError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

/// Exit status for runs whose reports contain errors.
pub(crate) const EXIT_REPORTED_ERRORS: u8 = 1;
/// Exit status for configuration and usage problems.
pub(crate) const EXIT_CONFIGURATION: u8 = 2;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("no target version is known; pass --target-version-name")]
    NoTargetVersion,
    #[error("invalid migration request: {0}")]
    Configuration(EngineError),
    #[error("failed to write report: {0}")]
    WriteReport(io::Error),
}

impl AppError {
    /// Process exit status for this failure.
    pub(crate) const fn exit_code(&self) -> u8 {
        match self {
            Self::LoadConfiguration(_)
            | Self::CliUsage(_)
            | Self::Telemetry(_)
            | Self::NoTargetVersion
            | Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::WriteReport(_) => EXIT_REPORTED_ERRORS,
        }
    }
}
