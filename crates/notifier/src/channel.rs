use crate::alert::RenderedAlert;
use anyhow::Result;
use async_trait::async_trait;
use autotrader_core::config::ChannelKind;

/// One delivery backend.
#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Whether the channel is configured to send at all.
    fn is_enabled(&self) -> bool;

    /// # Errors
    ///
    /// Returns an error if the backend rejects or cannot receive the alert.
    async fn send(&self, alert: &RenderedAlert) -> Result<()>;
}
