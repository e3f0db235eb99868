use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    events::{AckHandle, EventsApiEvent, InnerEvent, SocketEvent},
    handlers::{EventHandlers, HandlerOutcome},
    socket::{SocketTransport, TransportError},
};

/// What the loop did with a single event. Handler tasks are detached; the
/// handle is only kept so callers can observe completion if they want to.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub handler: Option<JoinHandle<HandlerOutcome>>,
    pub acknowledged: bool,
}

pub struct EventDispatcher {
    transport: Arc<dyn SocketTransport>,
    handlers: Arc<EventHandlers>,
}

impl EventDispatcher {
    pub fn new(transport: Arc<dyn SocketTransport>, handlers: Arc<EventHandlers>) -> Self {
        Self { transport, handlers }
    }

    /// Consumes the transport stream one event at a time until it closes.
    pub async fn run(&self) -> Result<(), TransportError> {
        while let Some(event) = self.transport.next_event().await? {
            debug!(event_type = ?event.event_type(), "socket mode event received");
            self.dispatch(event).await;
        }

        info!(event_name = "ingress.slack.stream_closed", "socket mode event stream closed");
        Ok(())
    }

    pub async fn dispatch(&self, event: SocketEvent) -> Dispatched {
        match event {
            SocketEvent::Connecting { attempt } => {
                info!(attempt, "connecting to Slack with Socket Mode...");
            }
            SocketEvent::ConnectionError { attempt, reason } => {
                warn!(attempt, reason = %reason, "connection failed, retrying later...");
            }
            SocketEvent::Connected => {
                info!("connected to Slack with Socket Mode");
            }
            SocketEvent::EventsApi { ack, event } => {
                let handler = self.route(event);
                let acknowledged = self.acknowledge(&ack).await;
                return Dispatched { handler, acknowledged };
            }
            SocketEvent::Interactive { envelope_id } => {
                debug!(envelope_id = %envelope_id, "interactive payload ignored");
            }
            SocketEvent::SlashCommand { envelope_id } => {
                debug!(envelope_id = %envelope_id, "slash command ignored");
            }
            SocketEvent::Unknown { event_type } => {
                debug!(event_type = %event_type, "unknown socket mode event type");
            }
            SocketEvent::Malformed { event_type, reason } => {
                debug!(event_type = %event_type, reason = %reason, "dropping malformed socket mode event");
            }
        }

        Dispatched::default()
    }

    /// Starts the handler for a callback event without waiting for it.
    fn route(&self, event: EventsApiEvent) -> Option<JoinHandle<HandlerOutcome>> {
        let inner = match event {
            EventsApiEvent::Callback(inner) => inner,
            EventsApiEvent::Other { event_type } => {
                debug!(event_type = %event_type, "unsupported Events API event received");
                return None;
            }
        };

        let handlers = self.handlers.clone();
        match inner {
            InnerEvent::AppMention(event) => {
                Some(tokio::spawn(async move { handlers.handle_app_mention(&event).await }))
            }
            InnerEvent::EmojiChanged(event) => {
                Some(tokio::spawn(async move { handlers.handle_emoji_changed(&event).await }))
            }
            // Other callback kinds have no handler and are dropped without a log line.
            InnerEvent::Other { .. } => None,
        }
    }

    async fn acknowledge(&self, ack: &AckHandle) -> bool {
        match self.transport.acknowledge(ack).await {
            Ok(()) => {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %ack.envelope_id(),
                    "acknowledged slack envelope"
                );
                true
            }
            Err(error) => {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %ack.envelope_id(),
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
                false
            }
        }
    }
}
