use std::fmt;

use async_trait::async_trait;
use autopilot_core::error::ReporterError;

/// RGBA attachment color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Fully transparent; used for replies that should not show a color bar.
    pub const CLEAR: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Color> {
        let hex = s.trim().trim_start_matches('#');
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let a = if hex.len() == 8 { byte(6)? } else { 0xff };
        Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, a))
    }

    /// `#rrggbb`; Slack ignores alpha.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackBody {
    /// Attachment text.
    Message(String),
    /// PNG bytes uploaded as a file.
    Image(Vec<u8>),
}

/// One call to the chat API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackPost {
    pub token: String,
    pub channel: String,
    pub text: Option<String>,
    pub body: Option<SlackBody>,
    pub color: Option<Color>,
    /// Reply into this thread when set.
    pub thread_ts: Option<String>,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Sends one message and returns its timestamp, which identifies the thread.
    async fn post(&self, post: &SlackPost) -> Result<String, ReporterError>;
}

#[async_trait]
pub trait ScreenshotProvider: Send + Sync {
    /// PNG-encoded capture of the current screen.
    async fn capture(&self) -> Result<Vec<u8>, ReporterError>;
}
