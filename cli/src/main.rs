use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod app;
mod commands;
mod error;
mod orchestrator;
mod process;

use autopilot_core::log_source::{LogBroadcaster, LogCaptureLayer};
use commands::cli;

#[tokio::main]
async fn main() -> Result<(), error::CliError> {
    let broadcaster = LogBroadcaster::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .with(LogCaptureLayer::new(broadcaster.clone()))
        .init();

    let args = cli::Args::parse();
    match args.command {
        cli::Commands::Run(run_args) => {
            let exit = app::run_app(run_args, broadcaster).await?;
            std::process::exit(exit);
        }
    }
}
