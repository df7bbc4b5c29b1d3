use crate::alert::RenderedAlert;
use crate::channel::Channel;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use autotrader_core::config::{ChannelKind, WebhookConfig};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Posts each alert as JSON to a fixed URL.
pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    headline: String,
    #[serde(flatten)]
    alert: &'a RenderedAlert,
}

impl WebhookChannel {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebhookConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    async fn send(&self, alert: &RenderedAlert) -> Result<()> {
        let payload = WebhookPayload {
            headline: alert.headline(),
            alert,
        };
        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("webhook returned {status}"))
        }
    }
}
