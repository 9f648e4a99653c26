use async_trait::async_trait;
use autopilot_core::config::SlackConfig;
use autopilot_core::error::ReporterError;
use autopilot_core::reporter::{ReportInput, Reporter};

use super::api::Color;
use super::sender::{SendArgs, SlackMessageSender};

const SETTINGS_PLACEHOLDER: &str = "{settings}";

/// Posts the run outcome to every configured Slack channel.
pub struct SlackReporter {
    cfg: SlackConfig,
    sender: SlackMessageSender,
}

impl SlackReporter {
    pub fn new(cfg: SlackConfig, sender: SlackMessageSender) -> Self {
        Self { cfg, sender }
    }
}

fn color_or(hex: &str, fallback: Color) -> Color {
    Color::parse_hex(hex).unwrap_or_else(|| {
        tracing::warn!(target: "autopilot.slack", color = %hex, "invalid color, using default");
        fallback
    })
}

#[async_trait]
impl Reporter for SlackReporter {
    fn name(&self) -> &str {
        "slack"
    }

    async fn post_report(&self, input: &ReportInput) -> Result<(), ReporterError> {
        if self.cfg.token.trim().is_empty() || self.cfg.channels.is_empty() {
            tracing::warn!(target: "autopilot.slack", "Slack token or channels are not set");
            return Ok(());
        }

        let normally = input.exit_code.is_normally();
        if normally && !self.cfg.post_on_normally {
            return Ok(());
        }

        let (template, color, mentions, here, with_screenshot) = if normally {
            (
                &self.cfg.lead_text_on_normally,
                color_or(&self.cfg.color_on_normally, Color::rgba(0, 255, 0, 255)),
                &[][..],
                false,
                false,
            )
        } else {
            (
                &self.cfg.lead_text_on_error,
                color_or(&self.cfg.color_on_error, Color::rgba(255, 0, 0, 255)),
                self.cfg.mention_sub_team_ids.as_slice(),
                self.cfg.add_here_in_slack_message,
                self.cfg.with_screenshot_on_error,
            )
        };
        let lead = template.replace(SETTINGS_PLACEHOLDER, &input.run.name);

        let mut first_error = None;
        for channel in &self.cfg.channels {
            let args = SendArgs {
                token: &self.cfg.token,
                channel,
                mention_sub_team_ids: mentions,
                add_here: here,
                lead: &lead,
                message: &input.message,
                stack_trace: &input.stack_trace,
                color,
                with_screenshot,
            };
            if let Err(e) = self.sender.send(&args).await {
                tracing::error!(target: "autopilot.slack", channel = %channel, error = %e, "Slack post failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
