use std::sync::Arc;

use emojibot_core::config::AppConfig;
use emojibot_slack::{
    api::SlackWebClient,
    dispatch::EventDispatcher,
    handlers::EventHandlers,
    socket::{socket_mode, ReconnectPolicy, SocketModeClient},
};
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub socket_client: SocketModeClient,
    pub dispatcher: EventDispatcher,
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let transport_debug = config.transport_debug();
    info!(
        event_name = "system.bootstrap.start",
        environment = %config.environment,
        prod_like = config.is_prod_like(),
        transport_debug,
        "starting application bootstrap"
    );

    let api = Arc::new(SlackWebClient::new(config.slack.bot_token.clone(), transport_debug));
    let (socket_client, events) =
        socket_mode(config.slack.app_token.clone(), transport_debug, ReconnectPolicy::default());
    let handlers = Arc::new(EventHandlers::new(api, config.emoji_channel.clone()));
    let dispatcher = EventDispatcher::new(Arc::new(events), handlers);

    Application { config, socket_client, dispatcher }
}
