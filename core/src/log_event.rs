use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Log severity as delivered by the log source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Assert,
    Exception,
}

impl Severity {
    /// Rank used by severity filters: Info < Warning < Assert < Error.
    ///
    /// A filter at `Assert` passes Assert and Error. `Exception` passes every
    /// filter.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Assert => 2,
            Severity::Error => 3,
            Severity::Exception => 4,
        }
    }

    pub fn passes(self, min: Severity) -> bool {
        self == Severity::Exception || self.rank() >= min.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Assert => "assert",
            Severity::Exception => "exception",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "log" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "assert" => Ok(Severity::Assert),
            "exception" => Ok(Severity::Exception),
            _ => Err(ConfigError::InvalidValue {
                key: "severity".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// One log record observed during a run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
    pub severity: Severity,
}

impl LogEvent {
    pub fn new(
        message: impl Into<String>,
        stack_trace: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            message: message.into(),
            stack_trace: stack_trace.into(),
            severity,
        }
    }
}
