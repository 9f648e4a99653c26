use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;

use crate::classifier::IgnorePatternCache;
use crate::config::AppConfig;
use crate::error::RunError;
use crate::log_event::Severity;
use crate::reporter::ReportInput;

use super::exit::ExitCode;
use super::state::{LaunchType, RunClock, RunSnapshot, RunState};

/// Owner of the overall run; ends it when asked to.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Runs the shutdown sequence. Called at most once per run.
    async fn terminate(&self, report: ReportInput) -> Result<(), RunError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// This call won the latch and ran the shutdown sequence.
    Terminated,
    /// Another call is already terminating the run; nothing was done.
    AlreadyTerminating,
}

/// Run state plus termination coordination. One instance per process, shared
/// by `Arc`; reused across runs through `launch` and `reset`.
pub struct RunContext {
    state: Mutex<RunState>,
    orchestrator: Arc<dyn Orchestrator>,
    caches: Mutex<Vec<Weak<IgnorePatternCache>>>,
}

impl RunContext {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            state: Mutex::new(RunState::default()),
            orchestrator,
            caches: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ignore caches registered here are invalidated on every launch.
    pub fn register_ignore_cache(&self, cache: &Arc<IgnorePatternCache>) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.retain(|c| c.strong_count() > 0);
        caches.push(Arc::downgrade(cache));
    }

    /// Attaches settings and starts the run clock.
    pub fn launch(&self, settings: Arc<AppConfig>, launch_from: LaunchType) {
        {
            let mut state = self.lock();
            if state.is_running() {
                tracing::warn!(
                    target: "autopilot.run",
                    previous = %state.settings.as_ref().map(|s| s.name.as_str()).unwrap_or(""),
                    "launching while a run is active, previous run state is discarded"
                );
            }
            state.reset();
            state.launch_from = launch_from;
            state.clock = Some(RunClock::start());
            state.settings = Some(Arc::clone(&settings));
        }
        self.invalidate_caches();
        tracing::info!(target: "autopilot.run", name = %settings.name, "run launched");
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    pub fn settings(&self) -> Option<Arc<AppConfig>> {
        self.lock().settings.clone()
    }

    pub fn exit_code(&self) -> ExitCode {
        self.lock().exit_code
    }

    pub fn launch_from(&self) -> LaunchType {
        self.lock().launch_from
    }

    pub fn state(&self) -> RunState {
        self.lock().clone()
    }

    pub fn snapshot(&self) -> Result<RunSnapshot, RunError> {
        let state = self.lock();
        snapshot_of(&state)
    }

    /// Builds the reporter input for the active run.
    pub fn report_input(
        &self,
        message: &str,
        stack_trace: &str,
        severity: Option<Severity>,
        exit_code: ExitCode,
    ) -> Result<ReportInput, RunError> {
        Ok(ReportInput {
            message: message.to_string(),
            stack_trace: stack_trace.to_string(),
            severity,
            exit_code,
            run: self.snapshot()?,
        })
    }

    /// Terminates the active run. The first caller records its exit code and
    /// runs the orchestrator's shutdown; concurrent or later callers are no-ops.
    pub async fn terminate(
        &self,
        exit_code: ExitCode,
        message: &str,
        stack_trace: &str,
        severity: Option<Severity>,
    ) -> Result<TerminateOutcome, RunError> {
        let run = {
            let mut state = self.lock();
            let run = snapshot_of(&state)?;
            if state.terminating {
                tracing::debug!(
                    target: "autopilot.run",
                    requested = %exit_code,
                    recorded = %state.exit_code,
                    "run is already terminating"
                );
                return Ok(TerminateOutcome::AlreadyTerminating);
            }
            state.terminating = true;
            state.exit_code = exit_code;
            run
        };

        tracing::info!(
            target: "autopilot.run",
            exit_code = %exit_code,
            message = %message,
            "terminating run"
        );

        let report = ReportInput {
            message: message.to_string(),
            stack_trace: stack_trace.to_string(),
            severity,
            exit_code,
            run,
        };
        self.orchestrator.terminate(report).await?;
        Ok(TerminateOutcome::Terminated)
    }

    fn invalidate_caches(&self) {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.retain(|c| match c.upgrade() {
            Some(cache) => {
                cache.invalidate();
                true
            }
            None => false,
        });
    }
}

fn snapshot_of(state: &RunState) -> Result<RunSnapshot, RunError> {
    let settings = state.settings.clone().ok_or(RunError::NotRunning)?;
    let clock = state.clock.unwrap_or_else(RunClock::start);
    Ok(RunSnapshot {
        name: settings.name.clone(),
        settings,
        started_at: clock.started_at,
        elapsed: clock.elapsed(),
    })
}
