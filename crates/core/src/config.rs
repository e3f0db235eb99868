use std::env;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_EMOJI_CHANNEL: &str = "#general";
const CHANNEL_PREFIX: char = '#';

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub slack: SlackConfig,
    pub emoji_channel: String,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub environment: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub emoji_channel: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Skip reading process environment variables; only defaults and overrides apply.
    pub ignore_env: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            slack: SlackConfig { app_token: String::new().into(), bot_token: String::new().into() },
            emoji_channel: DEFAULT_EMOJI_CHANNEL.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Builds the session configuration from defaults, the process environment and
    /// explicit overrides, in that order of precedence.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut explicit_format = None;

        if !options.ignore_env {
            explicit_format = config.apply_env_overrides()?;
        }
        if let Some(format) = options.overrides.log_format {
            explicit_format = Some(format);
        }
        config.apply_overrides(options.overrides);

        config.logging.format = explicit_format.unwrap_or_else(|| config.default_log_format());
        config.emoji_channel = normalize_channel(&config.emoji_channel);
        config.validate()?;

        Ok(config)
    }

    /// Anything other than the `dev` environment is treated as production-like.
    pub fn is_prod_like(&self) -> bool {
        self.environment != DEFAULT_ENVIRONMENT
    }

    /// Verbose transport and API logging is only enabled outside production.
    pub fn transport_debug(&self) -> bool {
        !self.is_prod_like()
    }

    fn default_log_format(&self) -> LogFormat {
        if self.is_prod_like() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }

    fn apply_env_overrides(&mut self) -> Result<Option<LogFormat>, ConfigError> {
        if let Some(value) = read_env("ENV") {
            self.environment = value;
        }
        if let Some(value) = read_env("SLACK_APP_TOKEN") {
            self.slack.app_token = value.into();
        }
        if let Some(value) = read_env("SLACK_BOT_TOKEN") {
            self.slack.bot_token = value.into();
        }
        if let Some(value) = read_env("EMOJI_CHANNEL") {
            self.emoji_channel = value;
        }
        if let Some(value) = read_env("LOG_LEVEL") {
            self.logging.level = value;
        }

        match read_env("LOG_FORMAT") {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue { key: "LOG_FORMAT".to_string(), value }),
            None => Ok(None),
        }
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(app_token) = overrides.slack_app_token {
            self.slack.app_token = app_token.into();
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = bot_token.into();
        }
        if let Some(emoji_channel) = overrides.emoji_channel {
            self.emoji_channel = emoji_channel;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Prefixes a channel name with `#` unless it already carries one.
pub fn normalize_channel(channel: &str) -> String {
    if channel.starts_with(CHANNEL_PREFIX) {
        channel.to_string()
    } else {
        format!("{CHANNEL_PREFIX}{channel}")
    }
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::MissingVar("SLACK_APP_TOKEN"));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "SLACK_APP_TOKEN must start with `xapp-`{hint}. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::MissingVar("SLACK_BOT_TOKEN"));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "SLACK_BOT_TOKEN must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "LOG_LEVEL must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
