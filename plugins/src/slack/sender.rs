use std::sync::Arc;

use autopilot_core::error::ReporterError;

use super::api::{Color, ScreenshotProvider, SlackApi, SlackBody, SlackPost};

/// One incident notification.
#[derive(Debug, Clone)]
pub struct SendArgs<'a> {
    pub token: &'a str,
    pub channel: &'a str,
    pub mention_sub_team_ids: &'a [String],
    pub add_here: bool,
    pub lead: &'a str,
    pub message: &'a str,
    pub stack_trace: &'a str,
    pub color: Color,
    pub with_screenshot: bool,
}

/// Posts a lead message and threads the screenshot and stack trace under it.
pub struct SlackMessageSender {
    api: Arc<dyn SlackApi>,
    screenshots: Option<Arc<dyn ScreenshotProvider>>,
}

impl SlackMessageSender {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self {
            api,
            screenshots: None,
        }
    }

    pub fn with_screenshots(mut self, provider: Arc<dyn ScreenshotProvider>) -> Self {
        self.screenshots = Some(provider);
        self
    }

    /// Returns the lead message's timestamp. Every send is awaited in order;
    /// the first failure aborts the rest.
    pub async fn send(&self, args: &SendArgs<'_>) -> Result<String, ReporterError> {
        let lead = SlackPost {
            token: args.token.to_string(),
            channel: args.channel.to_string(),
            text: Some(lead_text(args.lead, args.mention_sub_team_ids, args.add_here)),
            body: Some(SlackBody::Message(args.message.to_string())),
            color: Some(args.color),
            thread_ts: None,
        };
        let ts = self.api.post(&lead).await?;
        tracing::debug!(target: "autopilot.slack", channel = %args.channel, ts = %ts, "lead message posted");

        if args.with_screenshot {
            match &self.screenshots {
                Some(provider) => {
                    let image = provider.capture().await?;
                    let reply = SlackPost {
                        token: args.token.to_string(),
                        channel: args.channel.to_string(),
                        text: None,
                        body: Some(SlackBody::Image(image)),
                        color: Some(Color::CLEAR),
                        thread_ts: Some(ts.clone()),
                    };
                    self.api.post(&reply).await?;
                }
                None => {
                    tracing::debug!(target: "autopilot.slack", "no screenshot provider, screenshot skipped");
                }
            }
        }

        let stack = SlackPost {
            token: args.token.to_string(),
            channel: args.channel.to_string(),
            text: Some(args.stack_trace.to_string()),
            body: None,
            color: None,
            thread_ts: Some(ts.clone()),
        };
        self.api.post(&stack).await?;

        Ok(ts)
    }
}

/// `@here` takes precedence over sub-team mentions; with neither, the lead is unchanged.
pub fn lead_text(lead: &str, mention_sub_team_ids: &[String], add_here: bool) -> String {
    if add_here {
        return format!("<!here> {lead}");
    }
    if mention_sub_team_ids.is_empty() {
        return lead.to_string();
    }
    let mut text: String = mention_sub_team_ids
        .iter()
        .map(|id| format!("<!subteam^{id}> "))
        .collect();
    text.push_str(lead);
    text
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;

    const MAGENTA: Color = Color::rgba(255, 0, 255, 255);

    #[derive(Default)]
    struct SpySlackApi {
        posts: Mutex<Vec<SlackPost>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl SlackApi for SpySlackApi {
        async fn post(&self, post: &SlackPost) -> Result<String, ReporterError> {
            let mut posts = self.posts.lock().unwrap();
            if self.fail_on == Some(posts.len()) {
                return Err(ReporterError::Api("rate_limited".into()));
            }
            posts.push(post.clone());
            Ok("1".to_string())
        }
    }

    struct FakeScreenshot;

    #[async_trait]
    impl ScreenshotProvider for FakeScreenshot {
        async fn capture(&self) -> Result<Vec<u8>, ReporterError> {
            Ok(b"IMAGE".to_vec())
        }
    }

    fn args<'a>(mentions: &'a [String], here: bool, screenshot: bool) -> SendArgs<'a> {
        SendArgs {
            token: "TOKEN",
            channel: "CHANNEL",
            mention_sub_team_ids: mentions,
            add_here: here,
            lead: "LEAD",
            message: "MESSAGE",
            stack_trace: "STACKTRACE",
            color: MAGENTA,
            with_screenshot: screenshot,
        }
    }

    fn lead_post(text: &str) -> SlackPost {
        SlackPost {
            token: "TOKEN".into(),
            channel: "CHANNEL".into(),
            text: Some(text.into()),
            body: Some(SlackBody::Message("MESSAGE".into())),
            color: Some(MAGENTA),
            thread_ts: None,
        }
    }

    fn stack_post() -> SlackPost {
        SlackPost {
            token: "TOKEN".into(),
            channel: "CHANNEL".into(),
            text: Some("STACKTRACE".into()),
            body: None,
            color: None,
            thread_ts: Some("1".into()),
        }
    }

    #[tokio::test]
    async fn no_mentions_no_screenshot_no_here() {
        let spy = Arc::new(SpySlackApi::default());
        let sender = SlackMessageSender::new(spy.clone());

        let ts = sender.send(&args(&[], false, false)).await.unwrap();

        assert_eq!(ts, "1");
        assert_eq!(*spy.posts.lock().unwrap(), vec![lead_post("LEAD"), stack_post()]);
    }

    #[tokio::test]
    async fn mentions_prefix_lead_in_order() {
        let spy = Arc::new(SpySlackApi::default());
        let sender = SlackMessageSender::new(spy.clone());
        let mentions = vec!["MENTION1".to_string(), "MENTION2".to_string()];

        sender.send(&args(&mentions, false, false)).await.unwrap();

        assert_eq!(
            *spy.posts.lock().unwrap(),
            vec![
                lead_post("<!subteam^MENTION1> <!subteam^MENTION2> LEAD"),
                stack_post()
            ]
        );
    }

    #[tokio::test]
    async fn screenshot_is_threaded_between_lead_and_stack_trace() {
        let spy = Arc::new(SpySlackApi::default());
        let sender = SlackMessageSender::new(spy.clone()).with_screenshots(Arc::new(FakeScreenshot));
        let mentions = vec!["MENTION1".to_string(), "MENTION2".to_string()];

        sender.send(&args(&mentions, false, true)).await.unwrap();

        let image = SlackPost {
            token: "TOKEN".into(),
            channel: "CHANNEL".into(),
            text: None,
            body: Some(SlackBody::Image(b"IMAGE".to_vec())),
            color: Some(Color::CLEAR),
            thread_ts: Some("1".into()),
        };
        assert_eq!(
            *spy.posts.lock().unwrap(),
            vec![
                lead_post("<!subteam^MENTION1> <!subteam^MENTION2> LEAD"),
                image,
                stack_post()
            ]
        );
    }

    #[tokio::test]
    async fn here_prefixes_lead() {
        let spy = Arc::new(SpySlackApi::default());
        let sender = SlackMessageSender::new(spy.clone());

        sender.send(&args(&[], true, false)).await.unwrap();

        assert_eq!(
            *spy.posts.lock().unwrap(),
            vec![lead_post("<!here> LEAD"), stack_post()]
        );
    }

    #[test]
    fn here_wins_over_mentions() {
        let mentions = vec!["A".to_string(), "B".to_string()];
        assert_eq!(lead_text("LEAD", &mentions, true), "<!here> LEAD");
        assert_eq!(lead_text("LEAD", &mentions, false), "<!subteam^A> <!subteam^B> LEAD");
        assert_eq!(lead_text("LEAD", &[], false), "LEAD");
    }

    #[tokio::test]
    async fn screenshot_flag_without_provider_sends_two_messages() {
        let spy = Arc::new(SpySlackApi::default());
        let sender = SlackMessageSender::new(spy.clone());

        sender.send(&args(&[], false, true)).await.unwrap();

        assert_eq!(spy.posts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_send_propagates() {
        let spy = Arc::new(SpySlackApi {
            fail_on: Some(1),
            ..SpySlackApi::default()
        });
        let sender = SlackMessageSender::new(spy.clone());

        let err = sender.send(&args(&[], false, false)).await.unwrap_err();

        assert!(matches!(err, ReporterError::Api(ref e) if e == "rate_limited"));
        assert_eq!(spy.posts.lock().unwrap().len(), 1);
    }
}
