use crate::alert::RenderedAlert;
use crate::channel::Channel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use autotrader_core::config::{ChannelKind, EmailConfig};
use lettre::message::header;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

/// SMTP channel over STARTTLS.
///
/// lettre's SMTP transport is blocking, so each send runs on the blocking pool.
pub struct EmailChannel {
    config: EmailConfig,
    timeout: Duration,
}

impl EmailChannel {
    #[must_use]
    pub const fn new(config: EmailConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

fn send_blocking(config: &EmailConfig, timeout: Duration, subject: String, body: String) -> Result<()> {
    let email = Message::builder()
        .from(config.from.parse().context("invalid from address")?)
        .to(config.to.parse().context("invalid to address")?)
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN)
        .body(body)?;

    let creds = Credentials::new(config.username.clone(), config.password.clone());
    let mailer = SmtpTransport::starttls_relay(&config.smtp_server)?
        .port(config.smtp_port)
        .credentials(creds)
        .timeout(Some(timeout))
        .build();

    mailer.send(&email)?;
    Ok(())
}

#[async_trait]
impl Channel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.smtp_server.is_empty() && !self.config.to.is_empty()
    }

    async fn send(&self, alert: &RenderedAlert) -> Result<()> {
        let config = self.config.clone();
        let timeout = self.timeout;
        let subject = alert.headline();
        let body = alert.body.clone();

        tokio::task::spawn_blocking(move || send_blocking(&config, timeout, subject, body))
            .await
            .context("email task panicked")?
    }
}
