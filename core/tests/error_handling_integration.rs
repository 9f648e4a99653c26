//! End-to-end flow: log source -> classifier -> agent -> dispatcher / run
//! termination, with the file log sink subscribed alongside.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autopilot_core::api::*;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;

struct RecordingReporter {
    name: &'static str,
    fail: bool,
    posts: Mutex<Vec<ReportInput>>,
}

impl RecordingReporter {
    fn new(name: &'static str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail,
            posts: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    fn name(&self) -> &str {
        self.name
    }

    async fn post_report(&self, input: &ReportInput) -> Result<(), ReporterError> {
        self.posts.lock().unwrap().push(input.clone());
        if self.fail {
            return Err(ReporterError::Api("channel_not_found".into()));
        }
        Ok(())
    }
}

/// Stands in for the binary's orchestrator: posts the final report and stops the agent.
struct StopOrchestrator {
    dispatcher: ReportDispatcher,
    cancel: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl Orchestrator for StopOrchestrator {
    async fn terminate(&self, report: ReportInput) -> Result<(), RunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dispatcher.dispatch(&report).await;
        self.cancel.cancel();
        Ok(())
    }
}

fn settings(dir: &std::path::Path) -> Arc<AppConfig> {
    let mut cfg = AppConfig {
        name: "integration".into(),
        output_root_path: dir.display().to_string(),
        ..AppConfig::default()
    };
    cfg.error_handler.policy.handle_error = HandlingBehavior::ReportOnly;
    cfg.error_handler.ignore_messages = vec!["^Known issue".into()];
    cfg.file_logger.enabled = true;
    cfg.file_logger.timestamp = false;
    Arc::new(cfg)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn report_then_terminate_with_file_log() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path());

    let reporter = RecordingReporter::new("recording", false);
    let dispatcher = ReportDispatcher::new(vec![reporter.clone() as Arc<dyn Reporter>]);
    let cancel = CancellationToken::new();
    let orchestrator = Arc::new(StopOrchestrator {
        dispatcher: dispatcher.clone(),
        cancel: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let ctx = Arc::new(RunContext::new(orchestrator.clone()));
    ctx.launch(Arc::clone(&cfg), LaunchType::Embedded);

    let source = LogBroadcaster::new();
    let frames = FrameCounter::new();
    let log_path = dir.path().join("autopilot.log");
    let file_logger = Arc::new(
        start_file_logger(&cfg.file_logger, Some(log_path.clone()), frames.clone())
            .await
            .unwrap()
            .unwrap(),
    );
    let sink = Arc::clone(&file_logger);
    let _file_sub = source.subscribe(Arc::new(move |ev: &LogEvent| sink.log(ev)));

    let agent = ErrorHandlerAgent::new(
        "ErrorHandlerAgent",
        LogClassifier::new(
            cfg.error_handler.policy.clone(),
            cfg.error_handler.ignore_messages.clone(),
        ),
        Arc::clone(&ctx),
        dispatcher,
    )
    .with_frames(frames);
    let attached = agent.attach(&source);

    source.publish(&LogEvent::new("scene loaded", "", Severity::Info));
    source.publish(&LogEvent::new("Known issue: shader", "", Severity::Exception));
    source.publish(&LogEvent::new("missing texture", "at Loader.Load()", Severity::Error));
    source.publish(&LogEvent::new("NullReferenceException", "at Player.Update()", Severity::Exception));
    source.publish(&LogEvent::new("second crash", "", Severity::Exception));

    let report = tokio::time::timeout(Duration::from_secs(5), attached.run(cancel.clone()))
        .await
        .unwrap();
    let outcomes = report.drain().await;
    file_logger.release().await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(orchestrator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.exit_code(), ExitCode::UnCatchExceptions);

    // One report-only post plus the final report of whichever crash won the latch.
    let posts = reporter.posts.lock().unwrap();
    assert_eq!(posts.len(), 2);
    let report_only = posts
        .iter()
        .find(|p| p.message == "missing texture")
        .unwrap();
    assert_eq!(report_only.exit_code, ExitCode::DetectErrorsInLog);
    let last = posts
        .iter()
        .find(|p| p.message != "missing texture")
        .unwrap();
    assert_eq!(last.exit_code, ExitCode::UnCatchExceptions);
    assert!(posts.iter().all(|p| p.run.name == "integration"));

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(
        content,
        "scene loaded\nKnown issue: shader\nmissing texture\nNullReferenceException\nsecond crash\n"
    );
}

#[tokio::test]
async fn own_diagnostics_are_captured_but_never_reported_again() {
    let broadcaster = LogBroadcaster::new();
    let subscriber =
        tracing_subscriber::registry().with(LogCaptureLayer::new(broadcaster.clone()));
    let _guard = tracing::subscriber::set_default(subscriber);

    let captured = Arc::new(Mutex::new(Vec::<LogEvent>::new()));
    let seen = Arc::clone(&captured);
    let _spy = broadcaster.subscribe(Arc::new(move |ev: &LogEvent| {
        seen.lock().unwrap().push(ev.clone());
    }));

    let broken = RecordingReporter::new("broken", true);
    let dispatcher = ReportDispatcher::new(vec![broken.clone() as Arc<dyn Reporter>]);
    let cancel = CancellationToken::new();
    let orchestrator = Arc::new(StopOrchestrator {
        dispatcher: dispatcher.clone(),
        cancel: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let ctx = Arc::new(RunContext::new(orchestrator.clone()));
    ctx.launch(Arc::new(AppConfig::default()), LaunchType::Embedded);

    let policy = HandlingPolicy {
        handle_error: HandlingBehavior::ReportOnly,
        ..HandlingPolicy::default()
    };
    let agent = ErrorHandlerAgent::new(
        "ErrorHandlerAgent",
        LogClassifier::new(policy, vec![]),
        Arc::clone(&ctx),
        dispatcher,
    );
    let attached = agent.attach(&broadcaster);
    broadcaster.publish(&LogEvent::new("asset missing", "at Game.Start()", Severity::Error));

    let stopper = async {
        wait_until(|| {
            captured
                .lock()
                .unwrap()
                .iter()
                .any(|ev| ev.message.contains("reporter failed"))
        })
        .await;
        // Give a looped event the chance to be escalated before stopping.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(attached.run(cancel.clone()), stopper);

    assert_eq!(report.handled, 1);
    report.drain().await;
    assert_eq!(broken.count(), 1);
    assert_eq!(orchestrator.calls.load(Ordering::SeqCst), 0);

    let captured = captured.lock().unwrap();
    let failure = captured
        .iter()
        .find(|ev| ev.message.contains("reporter failed"))
        .unwrap();
    assert_eq!(failure.severity, Severity::Error);
    assert!(failure
        .stack_trace
        .contains("autopilot_core::reporter::dispatcher"));
}

#[tokio::test]
async fn file_log_timestamps_follow_wall_clock_between_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.file_logger.enabled = true;
    cfg.file_logger.timestamp = true;

    let ctx = Arc::new(RunContext::new(Arc::new(StopOrchestrator {
        dispatcher: ReportDispatcher::default(),
        cancel: CancellationToken::new(),
        calls: AtomicUsize::new(0),
    })));
    ctx.launch(Arc::new(cfg.clone()), LaunchType::Embedded);

    let source = LogBroadcaster::new();
    let frames = FrameCounter::new();
    let log_path = dir.path().join("timestamps.log");
    let file_logger = Arc::new(
        start_file_logger(&cfg.file_logger, Some(log_path.clone()), frames.clone())
            .await
            .unwrap()
            .unwrap(),
    );
    let sink = Arc::clone(&file_logger);
    let _file_sub = source.subscribe(Arc::new(move |ev: &LogEvent| sink.log(ev)));

    let agent = ErrorHandlerAgent::new(
        "ErrorHandlerAgent",
        LogClassifier::new(HandlingPolicy::default(), vec![]),
        Arc::clone(&ctx),
        ReportDispatcher::default(),
    )
    .with_frames(frames);

    let cancel = CancellationToken::new();
    let logging = async {
        source.publish(&LogEvent::new("start", "", Severity::Info));
        tokio::time::sleep(FRAME_PERIOD * 6).await;
        source.publish(&LogEvent::new("later", "", Severity::Warning));
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(agent.run(&source, cancel.clone()), logging);
    assert_eq!(report.handled, 0);
    file_logger.release().await;

    let content = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("] start"));
    assert!(lines[1].ends_with("] later"));
    assert_ne!(&lines[0][..15], &lines[1][..15]);
}
