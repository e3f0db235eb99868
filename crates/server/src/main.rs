mod bootstrap;

use std::process::ExitCode;

use anyhow::Result;
use emojibot_core::config::{AppConfig, LoadOptions, LoggingConfig};
use tracing::{error, info};

use crate::bootstrap::Application;

fn init_logging(logging: &LoggingConfig) {
    use emojibot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            init_logging(&LoggingConfig::default());
            error!(error = %error, "failed to init configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(error = %error, "failed to run bot");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let Application { config, socket_client, dispatcher } =
        bootstrap::bootstrap_with_config(config);

    info!(
        event_name = "system.server.started",
        environment = %config.environment,
        emoji_channel = %config.emoji_channel,
        "emojibot started"
    );

    // The consumer runs beside the session; in-flight handler tasks are not drained on exit.
    let consumer = tokio::spawn(async move { dispatcher.run().await });

    tokio::select! {
        result = socket_client.run() => result?,
        result = consumer => result??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!(event_name = "system.server.signal", "shutdown signal received");
        }
    }

    info!(event_name = "system.server.stopping", "emojibot stopping");
    Ok(())
}
