use std::time::Duration;

use async_trait::async_trait;
use autopilot_core::error::ReporterError;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::api::{SlackApi, SlackBody, SlackPost};

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client: `chat.postMessage` for text, `files.upload` for images.
pub struct HttpSlackApi {
    http: Client,
    base_url: String,
}

impl HttpSlackApi {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Result<Self, ReporterError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ReporterError::Transport(e.into()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_message(&self, post: &SlackPost) -> Result<String, ReporterError> {
        let mut payload = json!({
            "channel": post.channel,
            "text": post.text.clone().unwrap_or_default(),
        });
        if let Some(ts) = &post.thread_ts {
            payload["thread_ts"] = Value::String(ts.clone());
        }
        let message = match &post.body {
            Some(SlackBody::Message(m)) => Some(m.as_str()),
            _ => None,
        };
        if message.is_some() || post.color.is_some() {
            let mut attachment = json!({ "text": message.unwrap_or_default() });
            if let Some(color) = post.color {
                attachment["color"] = Value::String(color.to_hex());
            }
            payload["attachments"] = json!([attachment]);
        }

        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&post.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReporterError::Transport(e.into()))?;

        let ts = read_response(resp).await?.ts;
        match (ts, &post.thread_ts) {
            (Some(ts), _) => Ok(ts),
            // A lead message without ts cannot anchor its replies.
            (None, None) => Err(ReporterError::Api("missing ts".to_string())),
            (None, Some(parent)) => Ok(parent.clone()),
        }
    }

    async fn upload_image(&self, post: &SlackPost, image: &[u8]) -> Result<String, ReporterError> {
        let part = Part::bytes(image.to_vec())
            .file_name("screenshot.png")
            .mime_str("image/png")
            .map_err(|e| ReporterError::Transport(e.into()))?;
        let mut form = Form::new()
            .text("channels", post.channel.clone())
            .text("filename", "screenshot.png")
            .part("file", part);
        if let Some(text) = &post.text {
            form = form.text("initial_comment", text.clone());
        }
        if let Some(ts) = &post.thread_ts {
            form = form.text("thread_ts", ts.clone());
        }

        let resp = self
            .http
            .post(format!("{}/files.upload", self.base_url))
            .bearer_auth(&post.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReporterError::Transport(e.into()))?;

        read_response(resp).await?;
        // Uploads do not start threads; the reply belongs to the parent.
        Ok(post.thread_ts.clone().unwrap_or_default())
    }
}

async fn read_response(resp: reqwest::Response) -> Result<SlackResponse, ReporterError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ReporterError::Api(format!("http status {status}")));
    }
    let body: SlackResponse = resp
        .json()
        .await
        .map_err(|e| ReporterError::Transport(e.into()))?;
    if !body.ok {
        return Err(ReporterError::Api(
            body.error.unwrap_or_else(|| "unknown_error".to_string()),
        ));
    }
    Ok(body)
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn post(&self, post: &SlackPost) -> Result<String, ReporterError> {
        match &post.body {
            Some(SlackBody::Image(image)) => self.upload_image(post, image).await,
            _ => self.post_message(post).await,
        }
    }
}
