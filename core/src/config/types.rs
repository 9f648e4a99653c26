use serde::{Deserialize, Serialize};

use crate::classifier::HandlingPolicy;
use crate::log_event::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run name; also used as the JUnit test case name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Seconds until the run is terminated with `AutopilotLifespanExpired`. 0 disables.
    #[serde(default)]
    pub lifespan_sec: u64,

    /// Base directory for relative output paths.
    #[serde(default)]
    pub output_root_path: String,

    #[serde(default)]
    pub error_handler: ErrorHandlerConfig,

    #[serde(default)]
    pub junit: JUnitConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub file_logger: FileLoggerConfig,
}

fn default_name() -> String {
    "autopilot".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            lifespan_sec: 0,
            output_root_path: String::new(),
            error_handler: ErrorHandlerConfig::default(),
            junit: JUnitConfig::default(),
            slack: SlackConfig::default(),
            file_logger: FileLoggerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlerConfig {
    #[serde(flatten)]
    pub policy: HandlingPolicy,

    /// Regular expressions; matching messages are never reported.
    #[serde(default)]
    pub ignore_messages: Vec<String>,

    /// Extra stack-trace markers treated as self-originated (looped) logs.
    #[serde(default)]
    pub loop_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JUnitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_junit_output_path")]
    pub output_path: String,
}

fn default_true() -> bool {
    true
}

fn default_junit_output_path() -> String {
    "autopilot-result.xml".to_string()
}

impl Default for JUnitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            output_path: default_junit_output_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub mention_sub_team_ids: Vec<String>,

    #[serde(default)]
    pub add_here_in_slack_message: bool,

    /// `{settings}` is replaced with the run name.
    #[serde(default = "default_lead_text_on_error")]
    pub lead_text_on_error: String,

    #[serde(default = "default_lead_text_on_normally")]
    pub lead_text_on_normally: String,

    #[serde(default)]
    pub post_on_normally: bool,

    #[serde(default = "default_true")]
    pub with_screenshot_on_error: bool,

    /// `#rrggbb` or `#rrggbbaa`.
    #[serde(default = "default_color_on_error")]
    pub color_on_error: String,

    #[serde(default = "default_color_on_normally")]
    pub color_on_normally: String,

    #[serde(default = "default_slack_base_url")]
    pub base_url: String,

    #[serde(default = "default_slack_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lead_text_on_error() -> String {
    "{settings} occurred an error.".to_string()
}

fn default_lead_text_on_normally() -> String {
    "{settings} completed normally.".to_string()
}

fn default_color_on_error() -> String {
    "#ff0000".to_string()
}

fn default_color_on_normally() -> String {
    "#00ff00".to_string()
}

fn default_slack_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_slack_timeout_ms() -> u64 {
    10_000
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            channels: Vec::new(),
            mention_sub_team_ids: Vec::new(),
            add_here_in_slack_message: false,
            lead_text_on_error: default_lead_text_on_error(),
            lead_text_on_normally: default_lead_text_on_normally(),
            post_on_normally: false,
            with_screenshot_on_error: default_true(),
            color_on_error: default_color_on_error(),
            color_on_normally: default_color_on_normally(),
            base_url: default_slack_base_url(),
            timeout_ms: default_slack_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLoggerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_file_logger_output_path")]
    pub output_path: String,

    /// Minimum severity written to the file.
    #[serde(default = "default_filter_log_type")]
    pub filter_log_type: Severity,

    #[serde(default = "default_true")]
    pub timestamp: bool,
}

fn default_file_logger_output_path() -> String {
    "autopilot.log".to_string()
}

fn default_filter_log_type() -> Severity {
    Severity::Info
}

impl Default for FileLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_path: default_file_logger_output_path(),
            filter_log_type: default_filter_log_type(),
            timestamp: default_true(),
        }
    }
}
