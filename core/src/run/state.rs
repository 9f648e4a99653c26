use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::config::AppConfig;

use super::exit::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchType {
    #[default]
    NotSet,
    Commandline,
    Embedded,
}

/// Wall-clock and monotonic start of a run, captured once at launch.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    pub started_at: DateTime<Local>,
    started: Instant,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Authoritative state of the current run.
///
/// `settings.is_some()` means a run is active; `terminating` flips once per run.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub launch_from: LaunchType,
    pub settings: Option<Arc<AppConfig>>,
    pub exit_code: ExitCode,
    pub terminating: bool,
    pub clock: Option<RunClock>,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.settings.is_some()
    }

    pub fn reset(&mut self) {
        self.launch_from = LaunchType::NotSet;
        self.settings = None;
        self.exit_code = ExitCode::Normally;
        self.terminating = false;
        self.clock = None;
    }
}

/// Immutable view of the run handed to reporters.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub name: String,
    pub settings: Arc<AppConfig>,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}
