//! Threaded Slack notifications: a lead message with the screenshot and stack
//! trace as replies.

mod api;
mod http;
mod reporter;
mod sender;

pub use api::{Color, ScreenshotProvider, SlackApi, SlackBody, SlackPost};
pub use http::HttpSlackApi;
pub use reporter::SlackReporter;
pub use sender::{lead_text, SendArgs, SlackMessageSender};
