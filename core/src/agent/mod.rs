//! The error handler agent: turns observed log events into reports and run
//! termination.

mod error_handler;

pub use error_handler::{AgentReport, AttachedAgent, ErrorHandlerAgent, HandledOutcome, Pending};
