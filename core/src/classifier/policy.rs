use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::log_event::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlingBehavior {
    /// Ignore this log type.
    Ignore,
    /// Report only; the run keeps going.
    ReportOnly,
    /// Report and terminate the run.
    TerminateAutopilot,
}

impl HandlingBehavior {
    /// Launch-argument form: `true` forces termination, `false` forces ignore.
    pub fn from_flag(value: bool) -> Self {
        if value {
            HandlingBehavior::TerminateAutopilot
        } else {
            HandlingBehavior::Ignore
        }
    }
}

/// Per-severity handling. Read-only while a run is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlingPolicy {
    #[serde(default = "default_terminate")]
    pub handle_exception: HandlingBehavior,
    #[serde(default = "default_terminate")]
    pub handle_error: HandlingBehavior,
    #[serde(default = "default_terminate")]
    pub handle_assert: HandlingBehavior,
    #[serde(default = "default_ignore")]
    pub handle_warning: HandlingBehavior,
}

fn default_terminate() -> HandlingBehavior {
    HandlingBehavior::TerminateAutopilot
}

fn default_ignore() -> HandlingBehavior {
    HandlingBehavior::Ignore
}

impl Default for HandlingPolicy {
    fn default() -> Self {
        Self {
            handle_exception: default_terminate(),
            handle_error: default_terminate(),
            handle_assert: default_terminate(),
            handle_warning: default_ignore(),
        }
    }
}

/// Boolean overrides captured from launch arguments. `None` keeps the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOverrides {
    pub handle_exception: Option<bool>,
    pub handle_error: Option<bool>,
    pub handle_assert: Option<bool>,
    pub handle_warning: Option<bool>,
}

impl HandlingPolicy {
    pub fn behavior_for(&self, severity: Severity) -> Result<HandlingBehavior, ClassifyError> {
        match severity {
            Severity::Exception => Ok(self.handle_exception),
            Severity::Error => Ok(self.handle_error),
            Severity::Assert => Ok(self.handle_assert),
            Severity::Warning => Ok(self.handle_warning),
            Severity::Info => Err(ClassifyError::UnhandledSeverity(severity)),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &PolicyOverrides) {
        if let Some(v) = overrides.handle_exception {
            self.handle_exception = HandlingBehavior::from_flag(v);
        }
        if let Some(v) = overrides.handle_error {
            self.handle_error = HandlingBehavior::from_flag(v);
        }
        if let Some(v) = overrides.handle_assert {
            self.handle_assert = HandlingBehavior::from_flag(v);
        }
        if let Some(v) = overrides.handle_warning {
            self.handle_warning = HandlingBehavior::from_flag(v);
        }
    }
}
