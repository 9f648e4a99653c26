use thiserror::Error;

use crate::log_event::Severity;

/// Errors raised by run-level operations (termination, report-only dispatch).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("autopilot is not running")]
    NotRunning,

    #[error("orchestrator failed to terminate the run: {0}")]
    Orchestrator(String),
}

/// Classification is pure; the only failure is an unmapped severity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("no handling policy for severity {0:?}")]
    UnhandledSeverity(Severity),
}

#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("io error writing {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("xml serialization failed: {0}")]
    Xml(String),

    #[error("transport error")]
    Transport(#[source] anyhow::Error),

    #[error("api error: {0}")]
    Api(String),

    #[error("{0}")]
    NotRunning(#[from] RunError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config read error: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error")]
    Parse(#[source] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
