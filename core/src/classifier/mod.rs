//! Log classification: decides whether a log event is ignored, reported, or
//! terminates the run.

mod ignore;
mod policy;

pub use ignore::{IgnorePattern, IgnorePatternCache};
pub use policy::{HandlingBehavior, HandlingPolicy, PolicyOverrides};

use std::sync::Arc;

use crate::error::ClassifyError;
use crate::log_event::{LogEvent, Severity};
use crate::run::ExitCode;

/// Stack-trace markers of the components whose own logs must never be
/// reported again. Anything logged while a report is being dispatched carries
/// the dispatcher's span and matches `autopilot_core::reporter::dispatcher`.
pub const LOOP_MARKERS: &[&str] = &[
    "autopilot_core::agent",
    "autopilot_core::classifier",
    "autopilot_core::reporter::dispatcher",
    "autopilot_plugins::slack",
];

pub struct LogClassifier {
    policy: HandlingPolicy,
    ignore: Arc<IgnorePatternCache>,
    loop_markers: Vec<String>,
}

impl LogClassifier {
    pub fn new(policy: HandlingPolicy, ignore_messages: Vec<String>) -> Self {
        Self {
            policy,
            ignore: Arc::new(IgnorePatternCache::new(ignore_messages)),
            loop_markers: LOOP_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_loop_markers(mut self, extra: impl IntoIterator<Item = String>) -> Self {
        self.loop_markers.extend(extra);
        self
    }

    pub fn policy(&self) -> &HandlingPolicy {
        &self.policy
    }

    /// Shared handle so the run context can invalidate the cache on launch.
    pub fn ignore_cache(&self) -> Arc<IgnorePatternCache> {
        Arc::clone(&self.ignore)
    }

    pub fn classify(&self, event: &LogEvent) -> Result<HandlingBehavior, ClassifyError> {
        if event.severity == Severity::Info {
            return Ok(HandlingBehavior::Ignore);
        }

        if self.is_looped(&event.stack_trace) {
            tracing::debug!(
                target: "autopilot.classifier",
                message = %event.message,
                "ignore looped message"
            );
            return Ok(HandlingBehavior::Ignore);
        }

        if self.ignore.matches(&event.message) {
            return Ok(HandlingBehavior::Ignore);
        }

        self.policy.behavior_for(event.severity)
    }

    fn is_looped(&self, stack_trace: &str) -> bool {
        self.loop_markers
            .iter()
            .any(|m| !m.is_empty() && stack_trace.contains(m.as_str()))
    }
}

/// Exit code recorded for an escalated event of the given severity.
pub fn exit_code_for(severity: Severity) -> ExitCode {
    match severity {
        Severity::Exception => ExitCode::UnCatchExceptions,
        _ => ExitCode::DetectErrorsInLog,
    }
}
