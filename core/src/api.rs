//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `autopilot_core::api` instead of reaching into internal modules.

pub use crate::agent::{AgentReport, ErrorHandlerAgent, HandledOutcome};
pub use crate::classifier::{
    exit_code_for, HandlingBehavior, HandlingPolicy, IgnorePatternCache, LogClassifier,
    PolicyOverrides,
};
pub use crate::config::{AppConfig, FileLoggerConfig, JUnitConfig, SlackConfig};
pub use crate::error::{ClassifyError, ConfigError, ReporterError, RunError};
pub use crate::file_logger::{start_file_logger, FileLogger, FrameCounter, FRAME_PERIOD};
pub use crate::log_event::{LogEvent, Severity};
pub use crate::log_source::{LogBroadcaster, LogCaptureLayer, LogSource, Subscription};
pub use crate::reporter::{DispatchSummary, ReportDispatcher, ReportInput, Reporter};
pub use crate::run::{
    ExitCode, LaunchType, Orchestrator, RunContext, RunSnapshot, TerminateOutcome,
};
