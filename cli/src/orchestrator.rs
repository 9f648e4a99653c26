use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use autopilot_core::error::RunError;
use autopilot_core::reporter::{DispatchSummary, ReportDispatcher, ReportInput};
use autopilot_core::run::{ExitCode, Orchestrator};
use tokio_util::sync::CancellationToken;

/// Ends a command-line run: posts the final report to every reporter, then
/// cancels the run token so the agent and the program supervisor stop.
pub struct CliOrchestrator {
    dispatcher: ReportDispatcher,
    cancel: CancellationToken,
    outcome: Mutex<Option<(ExitCode, DispatchSummary)>>,
}

impl CliOrchestrator {
    pub fn new(dispatcher: ReportDispatcher, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            cancel,
            outcome: Mutex::new(None),
        }
    }

    pub fn outcome(&self) -> Option<(ExitCode, DispatchSummary)> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Orchestrator for CliOrchestrator {
    async fn terminate(&self, report: ReportInput) -> Result<(), RunError> {
        tracing::info!(
            target: "autopilot.cli",
            exit_code = %report.exit_code,
            message = %report.message,
            "terminating autopilot"
        );

        let summary = self.dispatcher.dispatch(&report).await;
        if !summary.is_ok() {
            tracing::info!(target: "autopilot.cli", failed = ?summary.failed, "some reporters failed");
        }
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((report.exit_code, summary));

        self.cancel.cancel();
        Ok(())
    }
}
