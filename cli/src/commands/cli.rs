use autopilot_core::classifier::PolicyOverrides;
use autopilot_core::config::{split_list, AppConfig};
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Run a program under autopilot error handling and reporting")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Launch a program and watch its output until it ends or the run is terminated.
    Run(RunArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Config file; defaults to `autopilot.toml` in the working directory when present.
    #[arg(long)]
    pub config: Option<String>,

    /// Run name, used in reports.
    #[arg(long)]
    pub name: Option<String>,

    /// Seconds until the run is terminated as expired. 0 disables.
    #[arg(long)]
    pub lifespan_sec: Option<u64>,

    #[arg(long)]
    pub output_root_path: Option<String>,

    /// `true` terminates the run on exceptions, `false` ignores them.
    #[arg(long)]
    pub handle_exception: Option<bool>,

    #[arg(long)]
    pub handle_error: Option<bool>,

    #[arg(long)]
    pub handle_assert: Option<bool>,

    #[arg(long)]
    pub handle_warning: Option<bool>,

    #[arg(long)]
    pub junit_report_path: Option<String>,

    #[arg(long)]
    pub file_logger_output_path: Option<String>,

    #[arg(long)]
    pub slack_token: Option<String>,

    /// Comma-separated channel ids.
    #[arg(long)]
    pub slack_channels: Option<String>,

    /// Do not echo the program's output.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Program and its arguments.
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    pub program: Vec<String>,
}

impl RunArgs {
    pub fn policy_overrides(&self) -> PolicyOverrides {
        PolicyOverrides {
            handle_exception: self.handle_exception,
            handle_error: self.handle_error,
            handle_assert: self.handle_assert,
            handle_warning: self.handle_warning,
        }
    }

    /// Command-line values win over the config file and the environment.
    pub fn apply(&self, cfg: &mut AppConfig) {
        let set = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        if let Some(v) = set(&self.name) {
            cfg.name = v;
        }
        if let Some(v) = self.lifespan_sec {
            cfg.lifespan_sec = v;
        }
        if let Some(v) = set(&self.output_root_path) {
            cfg.output_root_path = v;
        }
        if let Some(v) = set(&self.junit_report_path) {
            cfg.junit.output_path = v;
        }
        if let Some(v) = set(&self.file_logger_output_path) {
            cfg.file_logger.output_path = v;
        }
        if let Some(v) = set(&self.slack_token) {
            cfg.slack.token = v;
        }
        if let Some(v) = set(&self.slack_channels) {
            cfg.slack.channels = split_list(&v);
        }
        cfg.error_handler
            .policy
            .apply_overrides(&self.policy_overrides());
    }
}
