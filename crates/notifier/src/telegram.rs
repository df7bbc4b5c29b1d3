use crate::alert::RenderedAlert;
use crate::channel::Channel;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use autotrader_core::config::{ChannelKind, TelegramConfig};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Telegram Bot API `sendMessage` channel.
pub struct TelegramChannel {
    client: Client,
    config: TelegramConfig,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramChannel {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TelegramConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty() && !self.config.chat_id.is_empty()
    }

    async fn send(&self, alert: &RenderedAlert) -> Result<()> {
        let text = alert.text();
        let request = SendMessageRequest {
            chat_id: &self.config.chat_id,
            text: &text,
            disable_web_page_preview: true,
        };

        let response = self.client.post(self.url()).json(&request).send().await?;
        let status = response.status();
        if status.is_success() {
            debug!(alert_type = %alert.alert_type, "Telegram message sent");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(anyhow!("Telegram API error: {status} {body}"))
        }
    }
}
