use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Delay between the end of one poll cycle and the start of the next
    pub fetch_interval: Duration,
    /// Upper bound for every outbound HTTP call
    pub http_timeout: Duration,
    pub storage_path: PathBuf,
    /// Shared secret sent by the chat platform with every outgoing webhook
    pub webhook_token: String,
    pub slack: SlackConfig,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub api_url: String,
    pub token: String,
    pub channel_id: String,
    pub bot_name: String,
    pub icon_emoji: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            fetch_interval: Duration::from_secs(
                env::var("FETCH_INTERVAL_SECS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .context("FETCH_INTERVAL_SECS must be a valid number")?,
            ),
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be a valid number")?,
            ),
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "storage.json".to_string())
                .into(),
            webhook_token: env::var("WEBHOOK_TOKEN").context("WEBHOOK_TOKEN must be set")?,
            slack: SlackConfig {
                api_url: env::var("SLACK_API_URL")
                    .unwrap_or_else(|_| "https://slack.com/api/chat.postMessage".to_string()),
                token: env::var("SLACK_TOKEN").context("SLACK_TOKEN must be set")?,
                channel_id: env::var("SLACK_CHANNEL_ID")
                    .context("SLACK_CHANNEL_ID must be set")?,
                bot_name: env::var("BOT_NAME").unwrap_or_else(|_| "advent-bot".to_string()),
                icon_emoji: env::var("BOT_ICON_EMOJI").unwrap_or_else(|_| ":gift:".to_string()),
            },
        })
    }

    /// Shared HTTP client for site adapters and the notifier.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("advent-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")
    }
}
