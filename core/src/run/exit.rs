use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a run. Exactly one value is attached to a run's termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExitCode {
    #[default]
    Normally = 0,
    UnCatchExceptions = 1,
    DetectErrorsInLog = 2,
    AutopilotFailed = 3,
    AutopilotLifespanExpired = 4,
    AutopilotLaunchingFailed = 5,
}

impl ExitCode {
    pub const ALL: [ExitCode; 6] = [
        ExitCode::Normally,
        ExitCode::UnCatchExceptions,
        ExitCode::DetectErrorsInLog,
        ExitCode::AutopilotFailed,
        ExitCode::AutopilotLifespanExpired,
        ExitCode::AutopilotLaunchingFailed,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<ExitCode> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ExitCode::Normally => "Normally",
            ExitCode::UnCatchExceptions => "UnCatchExceptions",
            ExitCode::DetectErrorsInLog => "DetectErrorsInLog",
            ExitCode::AutopilotFailed => "AutopilotFailed",
            ExitCode::AutopilotLifespanExpired => "AutopilotLifespanExpired",
            ExitCode::AutopilotLaunchingFailed => "AutopilotLaunchingFailed",
        }
    }

    pub fn is_normally(self) -> bool {
        self == ExitCode::Normally
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a child process status to a shell-style exit code (signals → 128 + n).
pub fn normalize_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(windows)]
    {
        status.code().unwrap_or(1)
    }
}
