use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Correlates a payload event with the receipt Slack expects back on the socket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AckHandle {
    envelope_id: String,
}

impl AckHandle {
    pub fn new(envelope_id: impl Into<String>) -> Self {
        Self { envelope_id: envelope_id.into() }
    }

    pub fn envelope_id(&self) -> &str {
        &self.envelope_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Connecting { attempt: u32 },
    Connected,
    ConnectionError { attempt: u32, reason: String },
    EventsApi { ack: AckHandle, event: EventsApiEvent },
    Interactive { envelope_id: String },
    SlashCommand { envelope_id: String },
    Unknown { event_type: String },
    /// The envelope declared a known category but its payload did not decode.
    Malformed { event_type: String, reason: String },
}

impl SocketEvent {
    pub fn event_type(&self) -> SocketEventType {
        match self {
            Self::Connecting { .. } => SocketEventType::Connecting,
            Self::Connected => SocketEventType::Connected,
            Self::ConnectionError { .. } => SocketEventType::ConnectionError,
            Self::EventsApi { .. } => SocketEventType::EventsApi,
            Self::Interactive { .. } => SocketEventType::Interactive,
            Self::SlashCommand { .. } => SocketEventType::SlashCommand,
            Self::Unknown { .. } => SocketEventType::Unknown,
            Self::Malformed { .. } => SocketEventType::Malformed,
        }
    }

    /// Maps a Socket Mode envelope onto the event model.
    pub fn from_envelope(envelope_type: &str, envelope_id: &str, payload: Value) -> Self {
        match envelope_type {
            "events_api" => match EventsApiEvent::decode(payload) {
                Ok(event) => Self::EventsApi { ack: AckHandle::new(envelope_id), event },
                Err(error) => Self::Malformed {
                    event_type: envelope_type.to_owned(),
                    reason: error.to_string(),
                },
            },
            "interactive" => Self::Interactive { envelope_id: envelope_id.to_owned() },
            "slash_commands" => Self::SlashCommand { envelope_id: envelope_id.to_owned() },
            other => Self::Unknown { event_type: other.to_owned() },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketEventType {
    Connecting,
    Connected,
    ConnectionError,
    EventsApi,
    Interactive,
    SlashCommand,
    Unknown,
    Malformed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsApiEvent {
    Callback(InnerEvent),
    Other { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InnerEvent {
    AppMention(AppMentionEvent),
    EmojiChanged(EmojiChangedEvent),
    Other { event_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppMentionEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EmojiChangedEvent {
    #[serde(default)]
    pub subtype: EmojiChange,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum EmojiChange {
    Add,
    Remove,
    Other(String),
}

impl Default for EmojiChange {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for EmojiChange {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add" => Self::Add,
            "remove" => Self::Remove,
            _ => Self::Other(value),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing `{0}` field")]
    MissingField(&'static str),
    #[error("invalid `{event_type}` payload: {source}")]
    Invalid {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawEventsApi {
    #[serde(rename = "type")]
    event_type: Option<String>,
    event: Option<Value>,
}

impl EventsApiEvent {
    pub fn decode(payload: Value) -> Result<Self, DecodeError> {
        let raw: RawEventsApi = serde_json::from_value(payload).map_err(|source| {
            DecodeError::Invalid { event_type: "events_api".to_owned(), source }
        })?;
        let event_type = raw.event_type.ok_or(DecodeError::MissingField("type"))?;

        if event_type != "event_callback" {
            return Ok(Self::Other { event_type });
        }

        let inner = raw.event.ok_or(DecodeError::MissingField("event"))?;
        InnerEvent::decode(inner).map(Self::Callback)
    }
}

impl InnerEvent {
    pub fn decode(event: Value) -> Result<Self, DecodeError> {
        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("event.type"))?
            .to_owned();

        let decoded = match event_type.as_str() {
            "app_mention" => serde_json::from_value(event).map(Self::AppMention),
            "emoji_changed" => serde_json::from_value(event).map(Self::EmojiChanged),
            _ => return Ok(Self::Other { event_type: event_type.clone() }),
        };
        decoded.map_err(|source| DecodeError::Invalid { event_type, source })
    }
}
