use async_trait::async_trait;

use crate::error::ReporterError;
use crate::log_event::Severity;
use crate::run::{ExitCode, RunSnapshot};

/// What every sink receives for one incident or run outcome.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub message: String,
    pub stack_trace: String,
    /// `None` when the report does not come from a log event (lifespan expiry, normal end).
    pub severity: Option<Severity>,
    pub exit_code: ExitCode,
    pub run: RunSnapshot,
}

#[async_trait]
pub trait Reporter: Send + Sync {
    fn name(&self) -> &str;

    /// Post one report. Errors stay with this sink; the dispatcher logs them.
    async fn post_report(&self, input: &ReportInput) -> Result<(), ReporterError>;
}
