use autopilot_core::error::{ConfigError, ReporterError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("reporter setup failed: {0}")]
    Reporters(#[source] anyhow::Error),

    #[error("file logger failed: {0}")]
    FileLogger(#[from] ReporterError),
}
