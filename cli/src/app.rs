use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autopilot_core::agent::ErrorHandlerAgent;
use autopilot_core::classifier::LogClassifier;
use autopilot_core::config::{load_default, load_from, resolve_output_path, AppConfig};
use autopilot_core::file_logger::{start_file_logger, FrameCounter};
use autopilot_core::log_event::LogEvent;
use autopilot_core::log_source::{LogBroadcaster, LogSource};
use autopilot_core::reporter::ReportDispatcher;
use autopilot_core::run::{normalize_exit, ExitCode, LaunchType, RunContext};
use autopilot_plugins::factory::build_reporters;
use tokio_util::sync::CancellationToken;

use crate::commands::cli::RunArgs;
use crate::error::CliError;
use crate::orchestrator::CliOrchestrator;
use crate::process::{spawn_watched, WatchedProcess};

/// Lets the agent act on the program's last lines before a normal end is recorded.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

const OUTPUT_EOF_TIMEOUT: Duration = Duration::from_secs(2);

/// This binary's own diagnostics are never reported.
const CLI_LOOP_MARKER: &str = "autopilot_cli";

pub fn load_config(args: &RunArgs) -> Result<AppConfig, CliError> {
    let mut cfg = match &args.config {
        Some(path) => {
            let mut cfg = load_from(Path::new(path))?;
            autopilot_core::config::apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());
            cfg
        }
        None => load_default()?,
    };
    args.apply(&mut cfg);
    Ok(cfg)
}

/// Runs the program under the error handler and returns the process exit code.
pub async fn run_app(args: RunArgs, source: LogBroadcaster) -> Result<i32, CliError> {
    let cfg = Arc::new(load_config(&args)?);

    let cancel = CancellationToken::new();
    let dispatcher =
        ReportDispatcher::new(build_reporters(&cfg, None).map_err(CliError::Reporters)?);
    tracing::info!(target: "autopilot.cli", reporters = ?dispatcher.names(), "reporters configured");

    let orchestrator = Arc::new(CliOrchestrator::new(dispatcher.clone(), cancel.clone()));
    let ctx = Arc::new(RunContext::new(orchestrator.clone()));

    let classifier = LogClassifier::new(
        cfg.error_handler.policy.clone(),
        cfg.error_handler.ignore_messages.clone(),
    )
    .with_loop_markers(
        cfg.error_handler
            .loop_markers
            .iter()
            .cloned()
            .chain([CLI_LOOP_MARKER.to_string()]),
    );
    let frames = FrameCounter::new();
    let agent = ErrorHandlerAgent::new("ErrorHandlerAgent", classifier, Arc::clone(&ctx), dispatcher)
        .with_frames(frames.clone());

    ctx.launch(Arc::clone(&cfg), LaunchType::Commandline);

    let log_path = resolve_output_path(&cfg.output_root_path, &cfg.file_logger.output_path, None);
    let file_logger = start_file_logger(&cfg.file_logger, log_path, frames)
        .await?
        .map(Arc::new);
    let _file_subscription = file_logger.as_ref().map(|logger| {
        let logger = Arc::clone(logger);
        source.subscribe(Arc::new(move |ev: &LogEvent| logger.log(ev)))
    });

    // Subscribe before the program can write anything.
    let attached = agent.attach(&source);

    match spawn_watched(&args.program, source.clone(), !args.quiet) {
        Ok(process) => {
            let (report, ()) = tokio::join!(
                attached.run(cancel.clone()),
                supervise(process, &ctx, cfg.lifespan_sec, &cancel)
            );
            // In-flight reports finish before the process exits.
            report.drain().await;
        }
        Err(e) => {
            let message = format!("failed to launch {}: {e}", args.program.join(" "));
            if let Err(e) = ctx
                .terminate(ExitCode::AutopilotLaunchingFailed, &message, "", None)
                .await
            {
                tracing::info!(target: "autopilot.cli", error = %e, "terminate failed");
            }
            attached.run(cancel.clone()).await.drain().await;
        }
    }

    if let Some(logger) = &file_logger {
        logger.release().await;
    }

    let exit_code = orchestrator
        .outcome()
        .map(|(code, _)| code)
        .unwrap_or_else(|| ctx.exit_code());
    ctx.reset();

    tracing::info!(target: "autopilot.cli", exit_code = %exit_code, "autopilot finished");
    Ok(exit_code.code())
}

/// Waits for the program to end, the lifespan to expire, an interrupt, or
/// another party terminating the run, and terminates the run accordingly.
async fn supervise(
    mut process: WatchedProcess,
    ctx: &RunContext,
    lifespan_sec: u64,
    cancel: &CancellationToken,
) {
    let lifespan = async {
        if lifespan_sec == 0 {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(Duration::from_secs(lifespan_sec)).await;
    };

    let request = tokio::select! {
        status = process.child.wait() => {
            if tokio::time::timeout(OUTPUT_EOF_TIMEOUT, process.drain_output()).await.is_err() {
                tracing::debug!(target: "autopilot.cli", "program output still open after exit");
            }
            tokio::time::sleep(DRAIN_GRACE).await;
            Some(match status {
                Ok(status) => match normalize_exit(status) {
                    0 => (ExitCode::Normally, "Autopilot completed normally".to_string()),
                    code => (ExitCode::AutopilotFailed, format!("program exited with code {code}")),
                },
                Err(e) => (ExitCode::AutopilotFailed, format!("failed to wait for program: {e}")),
            })
        }
        _ = lifespan => Some((ExitCode::AutopilotLifespanExpired, "Autopilot lifespan expired".to_string())),
        _ = tokio::signal::ctrl_c() => Some((ExitCode::AutopilotFailed, "Autopilot interrupted".to_string())),
        _ = cancel.cancelled() => None,
    };

    if let Some((exit_code, message)) = request {
        if let Err(e) = ctx.terminate(exit_code, &message, "", None).await {
            tracing::info!(target: "autopilot.cli", error = %e, "terminate failed");
        }
    }

    if let Err(e) = process.child.kill().await {
        tracing::debug!(target: "autopilot.cli", error = %e, "program already exited");
    }
    process.abort_output();
}
