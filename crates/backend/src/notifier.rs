//! Chat notifications for newly published calendar entries.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SlackConfig;
use crate::error::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce the entry published on `day` (1..=25) of a calendar.
    async fn notify(&self, calendar_title: &str, day: usize, entry_url: &str)
        -> Result<(), NotifyError>;
}

/// Message text for one new entry, e.g. `Rust Advent Calendar 12/05 https://...`.
pub fn format_message(calendar_title: &str, day: usize, entry_url: &str) -> String {
    let title = calendar_title.trim();
    if title.is_empty() {
        format!("12/{:02} {}", day, entry_url)
    } else {
        format!("{} 12/{:02} {}", title, day, entry_url)
    }
}

/// Body of a `chat.postMessage` response
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts notifications through Slack's `chat.postMessage`.
pub struct SlackNotifier {
    client: reqwest::Client,
    config: SlackConfig,
}

impl SlackNotifier {
    pub fn new(client: reqwest::Client, config: SlackConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(
        &self,
        calendar_title: &str,
        day: usize,
        entry_url: &str,
    ) -> Result<(), NotifyError> {
        let text = format_message(calendar_title, day, entry_url);
        tracing::debug!("Posting message to {}: {}", self.config.channel_id, text);

        let params = [
            ("token", self.config.token.as_str()),
            ("channel", self.config.channel_id.as_str()),
            ("text", text.as_str()),
            ("unfurl_links", "true"),
            ("username", self.config.bot_name.as_str()),
            ("icon_emoji", self.config.icon_emoji.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.api_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Slack puts the reason in the body even for error statuses
        let parsed: Result<PostMessageResponse, _> = serde_json::from_str(&body);

        if !status.is_success() {
            return Err(match parsed.ok().and_then(|r| r.error) {
                Some(error) => NotifyError::Api(format!("{} (status {})", error, status.as_u16())),
                None => NotifyError::Status(status.as_u16()),
            });
        }

        let parsed = parsed.map_err(|e| NotifyError::InvalidResponse(e.to_string()))?;
        if !parsed.ok {
            return Err(NotifyError::Api(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        Ok(())
    }
}
