use std::sync::Arc;

use anyhow::Result;

use autopilot_core::config::AppConfig;
use autopilot_core::reporter::Reporter;

use crate::junit::JUnitXmlReporter;
use crate::slack::{HttpSlackApi, ScreenshotProvider, SlackMessageSender, SlackReporter};

pub fn build_junit(cfg: &AppConfig) -> Option<Arc<dyn Reporter>> {
    if !cfg.junit.enabled {
        return None;
    }
    Some(Arc::new(JUnitXmlReporter::new(cfg.junit.output_path.clone())))
}

pub fn build_slack(
    cfg: &AppConfig,
    screenshots: Option<Arc<dyn ScreenshotProvider>>,
) -> Result<Option<Arc<dyn Reporter>>> {
    if !cfg.slack.enabled {
        return Ok(None);
    }

    let api = HttpSlackApi::new(cfg.slack.base_url.clone(), cfg.slack.timeout_ms)?;
    let mut sender = SlackMessageSender::new(Arc::new(api));
    if let Some(provider) = screenshots {
        sender = sender.with_screenshots(provider);
    }
    Ok(Some(Arc::new(SlackReporter::new(cfg.slack.clone(), sender))))
}

/// Every enabled reporter, in a stable order: JUnit first, then Slack.
pub fn build_reporters(
    cfg: &AppConfig,
    screenshots: Option<Arc<dyn ScreenshotProvider>>,
) -> Result<Vec<Arc<dyn Reporter>>> {
    let mut reporters = Vec::new();
    reporters.extend(build_junit(cfg));
    reporters.extend(build_slack(cfg, screenshots)?);
    Ok(reporters)
}
