mod context;
mod exit;
mod state;

pub use context::{Orchestrator, RunContext, TerminateOutcome};
pub use exit::{normalize_exit, ExitCode};
pub use state::{LaunchType, RunClock, RunSnapshot, RunState};
