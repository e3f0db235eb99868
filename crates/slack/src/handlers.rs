use std::sync::Arc;

use tracing::{error, info};

use crate::{
    api::MessagingApi,
    blocks::{emoji_added_message, emojis_removed_message, mention_reply, MessageTemplate},
    events::{AppMentionEvent, EmojiChange, EmojiChangedEvent},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    Posted { channel: String },
    Ignored,
    SendFailed { channel: String },
}

/// Reaction logic for the callback events the bot understands. Shared read-only
/// between concurrently running handler tasks.
pub struct EventHandlers {
    api: Arc<dyn MessagingApi>,
    emoji_channel: String,
}

impl EventHandlers {
    pub fn new(api: Arc<dyn MessagingApi>, emoji_channel: impl Into<String>) -> Self {
        Self { api, emoji_channel: emoji_channel.into() }
    }

    pub async fn handle_app_mention(&self, event: &AppMentionEvent) -> HandlerOutcome {
        self.post(&event.channel, &mention_reply(), "failed posting message").await
    }

    pub async fn handle_emoji_changed(&self, event: &EmojiChangedEvent) -> HandlerOutcome {
        let message = match &event.subtype {
            EmojiChange::Add => {
                info!(event_type = "emoji_changed", subtype = "add", "handling emoji_changed event");
                emoji_added_message(&event.name)
            }
            EmojiChange::Remove => {
                info!(
                    event_type = "emoji_changed",
                    subtype = "remove",
                    "handling emoji_changed event"
                );
                match emojis_removed_message(&event.names) {
                    Some(message) => message,
                    None => return HandlerOutcome::Ignored,
                }
            }
            EmojiChange::Other(_) => return HandlerOutcome::Ignored,
        };

        let failure = format!("failed to publish message to {}", self.emoji_channel);
        self.post(&self.emoji_channel, &message, &failure).await
    }

    async fn post(&self, channel: &str, message: &MessageTemplate, failure: &str) -> HandlerOutcome {
        match self.api.post_message(channel, message).await {
            Ok(()) => HandlerOutcome::Posted { channel: channel.to_owned() },
            Err(err) => {
                error!(
                    event_name = "egress.slack.post_failed",
                    channel,
                    error = %err,
                    "{failure}"
                );
                HandlerOutcome::SendFailed { channel: channel.to_owned() }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::{layer::Context, prelude::*, Layer};

    use crate::{
        api::{ApiError, MessagingApi},
        blocks::MessageTemplate,
    };

    #[derive(Default)]
    pub(crate) struct RecordingApi {
        posts: Mutex<Vec<(String, MessageTemplate)>>,
        fail_with: Option<String>,
    }

    impl RecordingApi {
        pub(crate) fn failing(error: &str) -> Self {
            Self { posts: Mutex::default(), fail_with: Some(error.to_owned()) }
        }

        pub(crate) async fn posts(&self) -> Vec<(String, MessageTemplate)> {
            self.posts.lock().await.clone()
        }
    }

    /// Captures the level of every event emitted while installed.
    #[derive(Clone, Default)]
    pub(crate) struct EventLog {
        levels: Arc<StdMutex<Vec<Level>>>,
    }

    impl EventLog {
        pub(crate) fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
            tracing_subscriber::registry().with(self.clone())
        }

        pub(crate) fn levels(&self) -> Vec<Level> {
            self.levels.lock().map(|levels| levels.clone()).unwrap_or_default()
        }
    }

    impl<S: Subscriber> Layer<S> for EventLog {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if let Ok(mut levels) = self.levels.lock() {
                levels.push(*event.metadata().level());
            }
        }
    }

    #[async_trait]
    impl MessagingApi for RecordingApi {
        async fn post_message(
            &self,
            channel: &str,
            message: &MessageTemplate,
        ) -> Result<(), ApiError> {
            self.posts.lock().await.push((channel.to_owned(), message.clone()));
            match &self.fail_with {
                Some(error) => Err(ApiError::Slack(error.clone())),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing::{instrument::WithSubscriber, Level};

    use super::{
        testing::{EventLog, RecordingApi},
        EventHandlers, HandlerOutcome,
    };
    use crate::events::{AppMentionEvent, EmojiChange, EmojiChangedEvent};

    fn handlers(api: &Arc<RecordingApi>) -> EventHandlers {
        EventHandlers::new(api.clone(), "#general")
    }

    fn emoji_event(subtype: EmojiChange, name: &str, names: &[&str]) -> EmojiChangedEvent {
        EmojiChangedEvent {
            subtype,
            name: name.to_owned(),
            names: names.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn app_mention_replies_in_source_channel() {
        let api = Arc::new(RecordingApi::default());
        let event = AppMentionEvent {
            channel: "C123".to_owned(),
            user: "U1".to_owned(),
            text: "<@B1> anyone there?".to_owned(),
        };

        let outcome = handlers(&api).handle_app_mention(&event).await;

        assert_eq!(outcome, HandlerOutcome::Posted { channel: "C123".to_owned() });
        let posts = api.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "C123");
        assert_eq!(posts[0].1.fallback_text, "Yes, hello.");
    }

    #[tokio::test]
    async fn emoji_add_is_announced_in_broadcast_channel() {
        let api = Arc::new(RecordingApi::default());

        let outcome =
            handlers(&api).handle_emoji_changed(&emoji_event(EmojiChange::Add, "tada", &[])).await;

        assert_eq!(outcome, HandlerOutcome::Posted { channel: "#general".to_owned() });
        let posts = api.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "#general");
        assert_eq!(posts[0].1.header_text(), Some("New emoji added! :wave:"));
        assert!(posts[0].1.section_text().is_some_and(|text| text.contains(":tada: — `:tada:`")));
    }

    #[tokio::test]
    async fn emoji_remove_lists_every_name() {
        let api = Arc::new(RecordingApi::default());

        handlers(&api)
            .handle_emoji_changed(&emoji_event(EmojiChange::Remove, "", &["tada", "wave"]))
            .await;

        let posts = api.posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "#general");
        assert_eq!(posts[0].1.header_text(), Some("Emojis Removed"));
        assert_eq!(posts[0].1.section_text(), Some("`:tada: — :wave:`"));
    }

    #[tokio::test]
    async fn empty_removal_posts_nothing() {
        let api = Arc::new(RecordingApi::default());

        let outcome =
            handlers(&api).handle_emoji_changed(&emoji_event(EmojiChange::Remove, "", &[])).await;

        assert_eq!(outcome, HandlerOutcome::Ignored);
        assert!(api.posts().await.is_empty());
    }

    #[tokio::test]
    async fn unrecognized_subtype_posts_and_logs_nothing() {
        let api = Arc::new(RecordingApi::default());
        let log = EventLog::default();
        let handlers = handlers(&api);
        let event = emoji_event(EmojiChange::Other("rename".to_owned()), "x", &[]);

        let outcome =
            handlers.handle_emoji_changed(&event).with_subscriber(log.subscriber()).await;

        assert_eq!(outcome, HandlerOutcome::Ignored);
        assert!(api.posts().await.is_empty());
        assert!(log.levels().is_empty(), "unexpected log lines: {:?}", log.levels());
    }

    #[tokio::test]
    async fn emoji_add_logs_one_info_line() {
        let api = Arc::new(RecordingApi::default());
        let log = EventLog::default();
        let handlers = handlers(&api);
        let event = emoji_event(EmojiChange::Add, "tada", &[]);

        handlers.handle_emoji_changed(&event).with_subscriber(log.subscriber()).await;

        assert_eq!(log.levels(), vec![Level::INFO]);
    }

    #[tokio::test]
    async fn send_failure_is_reported_without_retry() {
        let api = Arc::new(RecordingApi::failing("channel_not_found"));

        let outcome =
            handlers(&api).handle_emoji_changed(&emoji_event(EmojiChange::Add, "tada", &[])).await;

        assert_eq!(outcome, HandlerOutcome::SendFailed { channel: "#general".to_owned() });
        assert_eq!(api.posts().await.len(), 1);
    }
}
