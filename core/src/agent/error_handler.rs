use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::classifier::{exit_code_for, HandlingBehavior, LogClassifier};
use crate::error::RunError;
use crate::file_logger::{FrameCounter, FRAME_PERIOD};
use crate::log_event::LogEvent;
use crate::log_source::{LogSource, Subscription};
use crate::reporter::{DispatchSummary, ReportDispatcher};
use crate::run::{RunContext, TerminateOutcome};

/// An event the classifier escalated, on its way to the coordinating loop.
#[derive(Debug)]
struct Escalated {
    event: LogEvent,
    behavior: HandlingBehavior,
}

/// Work started by the agent that outlives its loop.
#[derive(Debug)]
pub enum Pending {
    Report(JoinHandle<DispatchSummary>),
    Terminate(JoinHandle<Result<TerminateOutcome, RunError>>),
}

#[derive(Debug)]
pub enum HandledOutcome {
    Reported(DispatchSummary),
    Terminated(Result<TerminateOutcome, RunError>),
    /// The task panicked or was aborted by the runtime.
    Lost,
}

/// What a finished `run` leaves behind. Dropping it detaches the tasks;
/// they still run to completion.
#[derive(Debug, Default)]
pub struct AgentReport {
    pub handled: usize,
    pub pending: Vec<Pending>,
}

impl AgentReport {
    /// Waits for every report and termination started during the run.
    pub async fn drain(self) -> Vec<HandledOutcome> {
        let mut out = Vec::with_capacity(self.pending.len());
        for p in self.pending {
            let outcome = match p {
                Pending::Report(h) => h.await.map(HandledOutcome::Reported),
                Pending::Terminate(h) => h.await.map(HandledOutcome::Terminated),
            };
            out.push(outcome.unwrap_or(HandledOutcome::Lost));
        }
        out
    }
}

/// Watches the log stream for errors and reports or terminates the run.
///
/// Classification runs on whichever thread delivers the event. Escalated
/// events are queued to a single loop that owns every state change.
pub struct ErrorHandlerAgent {
    name: String,
    classifier: Arc<LogClassifier>,
    ctx: Arc<RunContext>,
    dispatcher: ReportDispatcher,
    frames: FrameCounter,
}

impl ErrorHandlerAgent {
    pub fn new(
        name: impl Into<String>,
        classifier: LogClassifier,
        ctx: Arc<RunContext>,
        dispatcher: ReportDispatcher,
    ) -> Self {
        ctx.register_ignore_cache(&classifier.ignore_cache());
        Self {
            name: name.into(),
            classifier: Arc::new(classifier),
            ctx,
            dispatcher,
            frames: FrameCounter::new(),
        }
    }

    /// Shares a frame counter with timestamped sinks. The loop advances it every
    /// [`FRAME_PERIOD`] and once per handled event.
    pub fn with_frames(mut self, frames: FrameCounter) -> Self {
        self.frames = frames;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribes to `source` and runs until `cancel` fires.
    pub async fn run(&self, source: &dyn LogSource, cancel: CancellationToken) -> AgentReport {
        self.attach(source).run(cancel).await
    }

    /// Subscribes without starting the loop. Events delivered from now on are
    /// queued for [`AttachedAgent::run`].
    pub fn attach(&self, source: &dyn LogSource) -> AttachedAgent<'_> {
        let (tx, rx) = mpsc::unbounded_channel::<Escalated>();
        let classifier = Arc::clone(&self.classifier);

        let subscription = source.subscribe(Arc::new(move |event: &LogEvent| {
            match classifier.classify(event) {
                Ok(HandlingBehavior::Ignore) => {}
                Ok(behavior) => {
                    // Closed only after the loop has exited.
                    let _ = tx.send(Escalated {
                        event: event.clone(),
                        behavior,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        target: "autopilot.agent",
                        error = %e,
                        message = %event.message,
                        "log classification failed"
                    );
                }
            }
        }));

        AttachedAgent {
            agent: self,
            subscription,
            rx,
        }
    }

    fn handle(&self, escalated: Escalated, report: &mut AgentReport) {
        let Escalated { event, behavior } = escalated;
        self.frames.advance();

        tracing::info!(
            target: "autopilot.agent",
            agent = %self.name,
            severity = %event.severity,
            behavior = ?behavior,
            message = %event.message,
            "handling log"
        );

        let exit_code = exit_code_for(event.severity);
        match behavior {
            HandlingBehavior::Ignore => return,
            HandlingBehavior::ReportOnly => {
                let input = match self.ctx.report_input(
                    &event.message,
                    &event.stack_trace,
                    Some(event.severity),
                    exit_code,
                ) {
                    Ok(input) => input,
                    Err(e) => {
                        tracing::error!(
                            target: "autopilot.agent",
                            agent = %self.name,
                            error = %e,
                            "cannot report"
                        );
                        return;
                    }
                };
                report
                    .pending
                    .push(Pending::Report(self.dispatcher.dispatch_detached(input)));
            }
            HandlingBehavior::TerminateAutopilot => {
                // Not tied to the agent's cancellation token.
                let ctx = Arc::clone(&self.ctx);
                let handle = tokio::spawn(async move {
                    let result = ctx
                        .terminate(
                            exit_code,
                            &event.message,
                            &event.stack_trace,
                            Some(event.severity),
                        )
                        .await;
                    if let Err(e) = &result {
                        tracing::error!(target: "autopilot.agent", error = %e, "terminate failed");
                    }
                    result
                });
                report.pending.push(Pending::Terminate(handle));
            }
        }
        report.handled += 1;
    }
}

/// An agent subscribed to a log source, holding the queue of escalated events.
pub struct AttachedAgent<'a> {
    agent: &'a ErrorHandlerAgent,
    subscription: Subscription,
    rx: mpsc::UnboundedReceiver<Escalated>,
}

impl AttachedAgent<'_> {
    pub async fn run(self, cancel: CancellationToken) -> AgentReport {
        let AttachedAgent {
            agent,
            subscription,
            mut rx,
        } = self;

        tracing::info!(target: "autopilot.agent", "Enter {}.run()", agent.name);

        let mut report = AgentReport::default();
        let mut frame_tick = tokio::time::interval(FRAME_PERIOD);
        frame_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                escalated = rx.recv() => match escalated {
                    Some(escalated) => agent.handle(escalated, &mut report),
                    None => break,
                },
                _ = cancel.cancelled() => break,
                _ = frame_tick.tick() => {
                    agent.frames.advance();
                }
            }
        }

        drop(subscription);
        // Events classified before the unsubscribe still get handled.
        while let Ok(escalated) = rx.try_recv() {
            agent.handle(escalated, &mut report);
        }

        tracing::info!(target: "autopilot.agent", "Exit {}.run()", agent.name);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::classifier::HandlingPolicy;
    use crate::config::AppConfig;
    use crate::error::ReporterError;
    use crate::log_event::Severity;
    use crate::log_source::LogBroadcaster;
    use crate::reporter::{ReportInput, Reporter};
    use crate::run::{ExitCode, LaunchType, Orchestrator};

    #[derive(Default)]
    struct SpyReporter {
        posts: Mutex<Vec<ReportInput>>,
    }

    #[async_trait]
    impl Reporter for SpyReporter {
        fn name(&self) -> &str {
            "spy"
        }

        async fn post_report(&self, input: &ReportInput) -> Result<(), ReporterError> {
            self.posts.lock().unwrap().push(input.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct SpyOrchestrator {
        calls: AtomicUsize,
        reports: Mutex<Vec<ReportInput>>,
    }

    #[async_trait]
    impl Orchestrator for SpyOrchestrator {
        async fn terminate(&self, report: ReportInput) -> Result<(), RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reports.lock().unwrap().push(report);
            Ok(())
        }
    }

    struct Fixture {
        agent: ErrorHandlerAgent,
        ctx: Arc<RunContext>,
        reporter: Arc<SpyReporter>,
        orchestrator: Arc<SpyOrchestrator>,
        source: LogBroadcaster,
    }

    fn fixture(policy: HandlingPolicy, ignore: Vec<String>, launched: bool) -> Fixture {
        let orchestrator = Arc::new(SpyOrchestrator::default());
        let ctx = Arc::new(RunContext::new(orchestrator.clone()));
        if launched {
            ctx.launch(Arc::new(AppConfig::default()), LaunchType::Embedded);
        }
        let reporter = Arc::new(SpyReporter::default());
        let dispatcher = ReportDispatcher::new(vec![reporter.clone() as Arc<dyn Reporter>]);
        let agent = ErrorHandlerAgent::new(
            "ErrorHandlerAgent",
            LogClassifier::new(policy, ignore),
            Arc::clone(&ctx),
            dispatcher,
        );
        Fixture {
            agent,
            ctx,
            reporter,
            orchestrator,
            source: LogBroadcaster::new(),
        }
    }

    fn report_errors() -> HandlingPolicy {
        HandlingPolicy {
            handle_exception: HandlingBehavior::TerminateAutopilot,
            handle_error: HandlingBehavior::ReportOnly,
            handle_assert: HandlingBehavior::Ignore,
            handle_warning: HandlingBehavior::Ignore,
        }
    }

    #[tokio::test]
    async fn ignored_events_reach_no_sink() {
        let f = fixture(report_errors(), vec!["^flaky".into()], true);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        f.source.publish(&LogEvent::new("hello", "", Severity::Info));
        f.source.publish(&LogEvent::new("careful", "", Severity::Warning));
        f.source.publish(&LogEvent::new("assert", "", Severity::Assert));
        f.source.publish(&LogEvent::new("flaky network", "", Severity::Exception));
        cancel.cancel();

        let report = attached.run(cancel).await;
        assert_eq!(report.handled, 0);
        assert!(report.drain().await.is_empty());
        assert!(f.reporter.posts.lock().unwrap().is_empty());
        assert_eq!(f.orchestrator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn report_only_dispatches_and_keeps_running() {
        let f = fixture(report_errors(), vec![], true);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        f.source
            .publish(&LogEvent::new("NullReference", "at Foo.Bar()", Severity::Error));
        cancel.cancel();

        let outcomes = attached.run(cancel).await.drain().await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], HandledOutcome::Reported(s) if s.is_ok()));

        let posts = f.reporter.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].message, "NullReference");
        assert_eq!(posts[0].stack_trace, "at Foo.Bar()");
        assert_eq!(posts[0].exit_code, ExitCode::DetectErrorsInLog);
        assert!(f.ctx.is_running());
        assert_eq!(f.orchestrator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn terminate_calls_orchestrator_with_exception_code() {
        let f = fixture(report_errors(), vec![], true);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        f.source
            .publish(&LogEvent::new("boom", "at Game.Update()", Severity::Exception));
        cancel.cancel();

        let outcomes = attached.run(cancel).await.drain().await;
        assert!(matches!(
            outcomes.as_slice(),
            [HandledOutcome::Terminated(Ok(TerminateOutcome::Terminated))]
        ));
        assert_eq!(f.orchestrator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.ctx.exit_code(), ExitCode::UnCatchExceptions);
        let reports = f.orchestrator.reports.lock().unwrap();
        assert_eq!(reports[0].message, "boom");
        assert_eq!(reports[0].severity, Some(Severity::Exception));
    }

    #[tokio::test]
    async fn report_without_active_run_is_logged_not_dispatched() {
        let f = fixture(report_errors(), vec![], false);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        f.source.publish(&LogEvent::new("err", "", Severity::Error));
        cancel.cancel();

        let report = attached.run(cancel).await;
        assert_eq!(report.handled, 0);
        assert!(report.pending.is_empty());
        assert!(f.reporter.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fatal_errors_from_many_threads_terminate_once() {
        let f = fixture(HandlingPolicy::default(), vec![], true);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let source = f.source.clone();
                std::thread::spawn(move || {
                    source.publish(&LogEvent::new(format!("fatal {i}"), "", Severity::Exception));
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        cancel.cancel();

        let outcomes = attached.run(cancel).await.drain().await;
        let terminated = outcomes
            .iter()
            .filter(|o| matches!(o, HandledOutcome::Terminated(Ok(TerminateOutcome::Terminated))))
            .count();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(terminated, 1);
        assert_eq!(f.orchestrator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscription_is_released_when_run_exits() {
        let f = fixture(report_errors(), vec![], true);
        let cancel = CancellationToken::new();

        let mut run = tokio_test::task::spawn(f.agent.run(&f.source, cancel.clone()));
        tokio_test::assert_pending!(run.poll());
        assert_eq!(f.source.subscriber_count(), 1);

        cancel.cancel();
        let report = tokio_test::assert_ready!(run.poll());
        assert_eq!(report.handled, 0);
        assert_eq!(f.source.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn frames_advance_while_no_event_arrives() {
        let f = fixture(report_errors(), vec![], true);
        let frames = FrameCounter::new();
        let agent = f.agent.with_frames(frames.clone());
        let cancel = CancellationToken::new();

        let stopper = async {
            tokio::time::sleep(FRAME_PERIOD * 5).await;
            cancel.cancel();
        };
        let (report, ()) = tokio::join!(agent.run(&f.source, cancel.clone()), stopper);

        assert_eq!(report.handled, 0);
        assert!(frames.frame() >= 2, "frame = {}", frames.frame());
    }

    #[tokio::test]
    async fn agent_logs_are_not_reclassified() {
        let f = fixture(HandlingPolicy::default(), vec![], true);
        let cancel = CancellationToken::new();
        let attached = f.agent.attach(&f.source);

        f.source.publish(&LogEvent::new(
            "cannot report",
            "at autopilot_core::agent::error_handler (core/src/agent/error_handler.rs:161)",
            Severity::Error,
        ));
        cancel.cancel();

        assert_eq!(attached.run(cancel).await.handled, 0);
        assert_eq!(f.orchestrator.calls.load(Ordering::SeqCst), 0);
    }
}
