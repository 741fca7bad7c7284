//! CLI error type.

use thiserror::Error;

use ridetrack::config::ConfigError;
use ridetrack::logging::LoggingError;
use ridetrack::session::TrackingError;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("tracking failed: {0}")]
    Tracking(#[from] TrackingError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to set signal handler: {0}")]
    Signal(String),
}
