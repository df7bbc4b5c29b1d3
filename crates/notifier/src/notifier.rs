use crate::alert::{AlertOutcome, AlertStatus, ChannelStatus};
use crate::channel::Channel;
use crate::email::EmailChannel;
use crate::limiter::AlertLimiter;
use crate::rules::RuleSet;
use crate::telegram::TelegramChannel;
use crate::template::render;
use crate::webhook::WebhookChannel;
use anyhow::Result;
use autotrader_core::config::{ChannelKind, NotificationConfig};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Best-effort alert dispatcher.
///
/// Alerts over the rate limit are dropped, never queued. Each target channel
/// is tried independently under its own timeout.
pub struct Notifier {
    enabled: bool,
    rules: RuleSet,
    limiter: AlertLimiter,
    channels: BTreeMap<ChannelKind, Arc<dyn Channel>>,
    send_timeout: Duration,
}

impl Notifier {
    /// Builds the Telegram, webhook and SMTP channels from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.send_timeout_secs);
        let channels: Vec<Arc<dyn Channel>> = vec![
            Arc::new(TelegramChannel::new(config.telegram.clone(), timeout)?),
            Arc::new(WebhookChannel::new(config.webhook.clone(), timeout)?),
            Arc::new(EmailChannel::new(config.email.clone(), timeout)),
        ];
        Ok(Self::with_channels(config, channels))
    }

    /// Builds a notifier over caller-supplied channels.
    #[must_use]
    pub fn with_channels(config: &NotificationConfig, channels: Vec<Arc<dyn Channel>>) -> Self {
        let channels: BTreeMap<_, _> = channels.into_iter().map(|c| (c.kind(), c)).collect();
        let enabled: Vec<&str> = channels
            .values()
            .filter(|c| c.is_enabled())
            .map(|c| c.kind().as_str())
            .collect();
        let limiter = AlertLimiter::new(
            config.max_alerts_per_minute,
            Duration::from_secs(config.cooldown_secs),
        );
        info!(
            enabled = config.enabled,
            channels = ?enabled,
            max_alerts = limiter.max_alerts(),
            window_secs = limiter.window().as_secs_f64(),
            "Notifier configured"
        );

        Self {
            enabled: config.enabled,
            rules: RuleSet::new(&config.rules, config.default_channel),
            limiter,
            channels,
            send_timeout: Duration::from_secs(config.send_timeout_secs.max(1)),
        }
    }

    /// Routes, renders and dispatches one alert.
    pub async fn send_alert(&self, alert_type: &str, data: Value) -> AlertOutcome {
        let route = self.rules.resolve(alert_type);
        let mut outcome = AlertOutcome {
            alert_type: alert_type.to_string(),
            priority: route.priority,
            status: AlertStatus::Disabled,
            channels: BTreeMap::new(),
        };

        if !self.enabled {
            return outcome;
        }
        if !self.limiter.try_acquire() {
            warn!(alert_type, "Alert dropped by rate limiter");
            outcome.status = AlertStatus::RateLimited;
            return outcome;
        }

        let alert = render(alert_type, route.priority, &data, Utc::now());
        for kind in route.channels {
            let status = match self.channels.get(&kind) {
                Some(channel) if channel.is_enabled() => {
                    match tokio::time::timeout(self.send_timeout, channel.send(&alert)).await {
                        Ok(Ok(())) => ChannelStatus::Sent,
                        Ok(Err(e)) => {
                            warn!(channel = %kind, alert_type, error = %e, "Alert send failed");
                            ChannelStatus::Failed
                        }
                        Err(_) => {
                            warn!(channel = %kind, alert_type, "Alert send timed out");
                            ChannelStatus::Failed
                        }
                    }
                }
                _ => ChannelStatus::Disabled,
            };
            outcome.channels.insert(kind, status);
        }

        outcome.status = AlertOutcome::summarize(&outcome.channels);
        debug!(alert_type, status = ?outcome.status, "Alert dispatched");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{types, RenderedAlert};
    use anyhow::bail;
    use async_trait::async_trait;
    use autotrader_core::config::AlertPriority;
    use parking_lot::Mutex;
    use serde_json::json;

    struct MockChannel {
        kind: ChannelKind,
        enabled: bool,
        fail: bool,
        delay: Option<Duration>,
        sent: Mutex<Vec<RenderedAlert>>,
    }

    impl MockChannel {
        fn new(kind: ChannelKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                enabled: true,
                fail: false,
                delay: None,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn failing(kind: ChannelKind) -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::plain(kind)
            })
        }

        fn disabled(kind: ChannelKind) -> Arc<Self> {
            Arc::new(Self {
                enabled: false,
                ..Self::plain(kind)
            })
        }

        fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Self::plain(kind)
            })
        }

        fn plain(kind: ChannelKind) -> Self {
            Self {
                kind,
                enabled: true,
                fail: false,
                delay: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn send(&self, alert: &RenderedAlert) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                bail!("mock failure");
            }
            self.sent.lock().push(alert.clone());
            Ok(())
        }
    }

    fn config(max_alerts: u32) -> NotificationConfig {
        NotificationConfig {
            max_alerts_per_minute: max_alerts,
            send_timeout_secs: 1,
            ..NotificationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_sends_to_routed_channels() {
        let telegram = MockChannel::new(ChannelKind::Telegram);
        let email = MockChannel::new(ChannelKind::Email);
        let notifier = Notifier::with_channels(&config(10), vec![telegram.clone(), email.clone()]);

        let outcome = notifier
            .send_alert(types::TRADE_EXECUTED, json!({ "symbol": "BTC/USDT" }))
            .await;

        assert_eq!(outcome.status, AlertStatus::Sent);
        assert_eq!(outcome.priority, AlertPriority::Normal);
        assert_eq!(telegram.count(), 1);
        assert_eq!(email.count(), 0);
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_others() {
        let telegram = MockChannel::failing(ChannelKind::Telegram);
        let webhook = MockChannel::new(ChannelKind::Webhook);
        let email = MockChannel::disabled(ChannelKind::Email);
        let notifier = Notifier::with_channels(
            &config(10),
            vec![telegram.clone(), webhook.clone(), email.clone()],
        );

        let outcome = notifier
            .send_alert(types::KILL_SWITCH, json!({ "reason": "manual" }))
            .await;

        assert_eq!(outcome.status, AlertStatus::PartiallySent);
        assert_eq!(outcome.priority, AlertPriority::Critical);
        assert_eq!(outcome.channels[&ChannelKind::Telegram], ChannelStatus::Failed);
        assert_eq!(outcome.channels[&ChannelKind::Webhook], ChannelStatus::Sent);
        assert_eq!(outcome.channels[&ChannelKind::Email], ChannelStatus::Disabled);
        assert!(webhook.sent.lock()[0].headline().starts_with("[CRITICAL]"));
    }

    #[tokio::test]
    async fn test_alert_over_limit_is_rate_limited_and_reaches_no_channel() {
        let telegram = MockChannel::new(ChannelKind::Telegram);
        let notifier = Notifier::with_channels(&config(3), vec![telegram.clone()]);

        for _ in 0..3 {
            let outcome = notifier.send_alert(types::TRADE_EXECUTED, json!({})).await;
            assert_eq!(outcome.status, AlertStatus::Sent);
        }
        let outcome = notifier.send_alert(types::TRADE_EXECUTED, json!({})).await;

        assert_eq!(outcome.status, AlertStatus::RateLimited);
        assert!(outcome.channels.is_empty());
        assert_eq!(telegram.count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_type_goes_to_default_channel() {
        let telegram = MockChannel::new(ChannelKind::Telegram);
        let notifier = Notifier::with_channels(&config(10), vec![telegram.clone()]);

        let outcome = notifier
            .send_alert("custom_event", json!({ "answer": 42 }))
            .await;

        assert_eq!(outcome.status, AlertStatus::Sent);
        assert_eq!(outcome.priority, AlertPriority::Normal);
        assert_eq!(telegram.sent.lock()[0].body, "answer: 42");
    }

    #[tokio::test]
    async fn test_slow_channel_times_out_as_failed() {
        let telegram = MockChannel::slow(ChannelKind::Telegram, Duration::from_secs(5));
        let notifier = Notifier::with_channels(&config(10), vec![telegram.clone()]);

        let outcome = notifier.send_alert(types::STRATEGY_ERROR, json!({})).await;
        assert_eq!(outcome.status, AlertStatus::Failed);
    }

    #[tokio::test]
    async fn test_disabled_notifier_sends_nothing() {
        let telegram = MockChannel::new(ChannelKind::Telegram);
        let cfg = NotificationConfig {
            enabled: false,
            ..config(10)
        };
        let notifier = Notifier::with_channels(&cfg, vec![telegram.clone()]);

        let outcome = notifier.send_alert(types::KILL_SWITCH, json!({})).await;
        assert_eq!(outcome.status, AlertStatus::Disabled);
        assert_eq!(telegram.count(), 0);
    }
}
