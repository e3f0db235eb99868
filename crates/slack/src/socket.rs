use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{info, warn};

use crate::{
    api::SLACK_API_BASE,
    events::{AckHandle, SocketEvent},
};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport write failed: {0}")]
    Send(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Consumer side of a Socket Mode session: a sequential event stream plus the
/// acknowledgement channel back to Slack.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Returns `None` once the session has ended and no more events will arrive.
    async fn next_event(&self) -> Result<Option<SocketEvent>, TransportError>;
    async fn acknowledge(&self, ack: &AckHandle) -> Result<(), TransportError>;
}

/// Builds a connected client/stream pair for one Socket Mode session.
pub fn socket_mode(
    app_token: SecretString,
    debug: bool,
    reconnect_policy: ReconnectPolicy,
) -> (SocketModeClient, SocketEvents) {
    SocketModeClient::with_base_url(
        reqwest::Client::new(),
        app_token,
        SLACK_API_BASE,
        debug,
        reconnect_policy,
    )
}

pub struct SocketEvents {
    events_rx: Mutex<mpsc::Receiver<SocketEvent>>,
    acks_tx: mpsc::UnboundedSender<AckHandle>,
}

#[async_trait]
impl SocketTransport for SocketEvents {
    async fn next_event(&self) -> Result<Option<SocketEvent>, TransportError> {
        Ok(self.events_rx.lock().await.recv().await)
    }

    async fn acknowledge(&self, ack: &AckHandle) -> Result<(), TransportError> {
        self.acks_tx
            .send(ack.clone())
            .map_err(|_| TransportError::Acknowledge("socket mode session has ended".to_owned()))
    }
}

pub struct SocketModeClient {
    http: reqwest::Client,
    app_token: SecretString,
    api_base: String,
    debug: bool,
    reconnect_policy: ReconnectPolicy,
    events_tx: mpsc::Sender<SocketEvent>,
    acks_rx: Mutex<mpsc::UnboundedReceiver<AckHandle>>,
}

enum SessionEnd {
    /// The event consumer went away; nothing left to deliver to.
    Closed,
    /// Slack asked us to move to a fresh connection.
    Reconnect,
}

impl SocketModeClient {
    pub fn with_base_url(
        http: reqwest::Client,
        app_token: SecretString,
        api_base: impl Into<String>,
        debug: bool,
        reconnect_policy: ReconnectPolicy,
    ) -> (Self, SocketEvents) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();

        let client = Self {
            http,
            app_token,
            api_base: api_base.into(),
            debug,
            reconnect_policy,
            events_tx,
            acks_rx: Mutex::new(acks_rx),
        };
        let events = SocketEvents { events_rx: Mutex::new(events_rx), acks_tx };
        (client, events)
    }

    /// Keeps a session open until the consumer hangs up or reconnection retries
    /// are exhausted.
    pub async fn run(&self) -> Result<(), TransportError> {
        let mut acks = self.acks_rx.lock().await;
        let mut attempt = 0_u32;

        loop {
            if !self.emit(SocketEvent::Connecting { attempt }).await {
                return Ok(());
            }

            let mut connected = false;
            match self.session(&mut acks, &mut connected).await {
                Ok(SessionEnd::Closed) => return Ok(()),
                Ok(SessionEnd::Reconnect) => attempt = 0,
                Err(error) => {
                    if connected {
                        attempt = 0;
                    }
                    let reason = error.to_string();
                    if !self.emit(SocketEvent::ConnectionError { attempt, reason }).await {
                        return Ok(());
                    }
                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            error = %error,
                            "socket mode retries exhausted"
                        );
                        return Err(error);
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn session(
        &self,
        acks: &mut mpsc::UnboundedReceiver<AckHandle>,
        connected: &mut bool,
    ) -> Result<SessionEnd, TransportError> {
        let url = self.open_connection().await?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    let message = match frame {
                        Some(Ok(message)) => message,
                        Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                        None => return Err(TransportError::Receive("socket stream ended".to_owned())),
                    };

                    match message {
                        WsMessage::Text(text) => {
                            self.log_frame(&text);
                            match decode_frame(&text) {
                                Frame::Hello => {
                                    *connected = true;
                                    if !self.emit(SocketEvent::Connected).await {
                                        return Ok(SessionEnd::Closed);
                                    }
                                }
                                Frame::Disconnect { reason } => {
                                    info!(reason = %reason, "slack requested disconnect; reconnecting");
                                    return Ok(SessionEnd::Reconnect);
                                }
                                Frame::Event(event) => {
                                    if !self.emit(event).await {
                                        return Ok(SessionEnd::Closed);
                                    }
                                }
                            }
                        }
                        WsMessage::Ping(payload) => {
                            write
                                .send(WsMessage::Pong(payload))
                                .await
                                .map_err(|error| TransportError::Send(error.to_string()))?;
                        }
                        WsMessage::Close(_) => {
                            return Err(TransportError::Receive("socket closed by server".to_owned()));
                        }
                        _ => {}
                    }
                }
                Some(ack) = acks.recv() => {
                    write
                        .send(WsMessage::Text(ack_frame(&ack)))
                        .await
                        .map_err(|error| TransportError::Acknowledge(error.to_string()))?;
                }
            }
        }
    }

    async fn open_connection(&self) -> Result<String, TransportError> {
        let connect_error = |error: reqwest::Error| TransportError::Connect(error.to_string());
        let response: ConnectionsOpenResponse = self
            .http
            .post(format!("{}/apps.connections.open", self.api_base))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(connect_error)?
            .json()
            .await
            .map_err(connect_error)?;

        response.into_url()
    }

    async fn emit(&self, event: SocketEvent) -> bool {
        self.events_tx.send(event).await.is_ok()
    }

    /// Raw frames are only written out when transport debugging is on, and then
    /// at info so they show up under the default filter.
    fn log_frame(&self, text: &str) {
        if self.debug {
            info!(event_name = "ingress.slack.frame", frame = %text, "socket mode frame received");
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ConnectionsOpenResponse {
    fn into_url(self) -> Result<String, TransportError> {
        if !self.ok {
            let error = self.error.unwrap_or_else(|| "unknown_error".to_owned());
            return Err(TransportError::Connect(format!("apps.connections.open failed: {error}")));
        }
        let url = self.url.ok_or_else(|| {
            TransportError::Connect("apps.connections.open returned no url".to_owned())
        })?;
        if !url.starts_with("wss://") {
            return Err(TransportError::Connect("socket mode url must use wss://".to_owned()));
        }
        Ok(url)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Hello,
    Disconnect { reason: String },
    Event(SocketEvent),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    reason: Option<String>,
}

fn decode_frame(text: &str) -> Frame {
    let raw = match serde_json::from_str::<RawFrame>(text) {
        Ok(raw) => raw,
        Err(error) => {
            return Frame::Event(SocketEvent::Malformed {
                event_type: "unparseable".to_owned(),
                reason: error.to_string(),
            })
        }
    };

    match raw.frame_type.as_str() {
        "hello" => Frame::Hello,
        "disconnect" => {
            Frame::Disconnect { reason: raw.reason.unwrap_or_else(|| "unknown".to_owned()) }
        }
        other => Frame::Event(match raw.envelope_id {
            Some(envelope_id) => SocketEvent::from_envelope(other, &envelope_id, raw.payload),
            None => SocketEvent::Malformed {
                event_type: other.to_owned(),
                reason: "missing envelope_id".to_owned(),
            },
        }),
    }
}

fn ack_frame(ack: &AckHandle) -> String {
    serde_json::json!({ "envelope_id": ack.envelope_id() }).to_string()
}
