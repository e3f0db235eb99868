use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::blocks::MessageTemplate;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("slack api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api returned error: {0}")]
    Slack(String),
}

/// Outbound half of the bot. Implementations must tolerate concurrent callers.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn post_message(&self, channel: &str, message: &MessageTemplate) -> Result<(), ApiError>;
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a MessageTemplate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl SlackResponse {
    pub(crate) fn into_result(self) -> Result<(), ApiError> {
        if self.ok {
            Ok(())
        } else {
            Err(ApiError::Slack(self.error.unwrap_or_else(|| "unknown_error".to_owned())))
        }
    }
}

pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
    api_base: String,
    debug: bool,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, debug: bool) -> Self {
        Self::with_base_url(reqwest::Client::new(), bot_token, SLACK_API_BASE, debug)
    }

    pub fn with_base_url(
        http: reqwest::Client,
        bot_token: SecretString,
        api_base: impl Into<String>,
        debug: bool,
    ) -> Self {
        Self { http, bot_token, api_base: api_base.into(), debug }
    }

    fn log_request(&self, body: &PostMessageRequest<'_>) {
        if self.debug {
            info!(
                event_name = "egress.slack.post_message",
                channel = body.channel,
                body = %serde_json::to_string(body).unwrap_or_default(),
                "posting slack message"
            );
        }
    }
}

#[async_trait]
impl MessagingApi for SlackWebClient {
    async fn post_message(&self, channel: &str, message: &MessageTemplate) -> Result<(), ApiError> {
        let body = PostMessageRequest { channel, message };
        self.log_request(&body);

        let response: SlackResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::{ApiError, PostMessageRequest, SlackResponse, SlackWebClient};
    use crate::{
        blocks::{emojis_removed_message, mention_reply},
        handlers::testing::EventLog,
    };

    #[test]
    fn request_body_carries_channel_text_and_blocks() {
        let message = emojis_removed_message(&["tada"]).expect("message");
        let body = serde_json::to_value(PostMessageRequest { channel: "#general", message: &message })
            .expect("serialize");

        assert_eq!(body["channel"], "#general");
        assert_eq!(body["text"], "Emojis Removed");
        assert_eq!(body["blocks"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn text_only_body_omits_blocks() {
        let message = mention_reply();
        let body = serde_json::to_value(PostMessageRequest { channel: "C1", message: &message })
            .expect("serialize");

        assert_eq!(body["text"], "Yes, hello.");
        assert!(body.get("blocks").is_none());
    }

    #[test]
    fn not_ok_response_maps_to_slack_error() {
        let response: SlackResponse =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).expect("parse");

        match response.into_result() {
            Err(ApiError::Slack(error)) => assert_eq!(error, "channel_not_found"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn ok_response_is_success() {
        let response: SlackResponse =
            serde_json::from_str(r#"{"ok":true,"channel":"C1","ts":"1.2"}"#).expect("parse");
        assert!(response.into_result().is_ok());
    }

    #[test]
    fn request_body_is_logged_at_info_only_in_debug_mode() {
        let message = mention_reply();
        let body = PostMessageRequest { channel: "C1", message: &message };

        let log = EventLog::default();
        let client = SlackWebClient::new("xoxb-test".to_owned().into(), true);
        tracing::subscriber::with_default(log.subscriber(), || client.log_request(&body));
        assert_eq!(log.levels(), vec![Level::INFO]);

        let quiet = EventLog::default();
        let client = SlackWebClient::new("xoxb-test".to_owned().into(), false);
        tracing::subscriber::with_default(quiet.subscriber(), || client.log_request(&body));
        assert!(quiet.levels().is_empty());
    }
}
