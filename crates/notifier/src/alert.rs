use autotrader_core::config::{AlertPriority, ChannelKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Alert type names with built-in rules and templates.
pub mod types {
    pub const KILL_SWITCH: &str = "kill_switch";
    pub const RISK_LIMIT: &str = "risk_limit";
    pub const RISK_WARNING: &str = "risk_warning";
    pub const TRADE_EXECUTED: &str = "trade_executed";
    pub const ORDER_FAILED: &str = "order_failed";
    pub const STRATEGY_ERROR: &str = "strategy_error";
    pub const DAILY_SUMMARY: &str = "daily_summary";
    pub const DAEMON_STARTED: &str = "daemon_started";
    pub const DAEMON_STOPPED: &str = "daemon_stopped";
    pub const SENTIMENT_ALERT: &str = "sentiment_alert";
}

/// An alert rendered once and handed to every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedAlert {
    pub alert_type: String,
    pub priority: AlertPriority,
    pub title: String,
    pub body: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl RenderedAlert {
    /// Title prefixed with the priority, e.g. `[CRITICAL] Kill switch activated`.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "[{}] {}",
            self.priority.to_string().to_uppercase(),
            self.title
        )
    }

    /// Headline and body as one plain-text message.
    #[must_use]
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.headline(), self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Sent,
    Failed,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Every enabled target channel accepted the alert.
    Sent,
    PartiallySent,
    /// No enabled target channel accepted the alert.
    Failed,
    /// Dropped by the rate limiter; no channel was contacted.
    RateLimited,
    /// Notifications are off, or every target channel is disabled.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub alert_type: String,
    pub priority: AlertPriority,
    pub status: AlertStatus,
    pub channels: BTreeMap<ChannelKind, ChannelStatus>,
}

impl AlertOutcome {
    #[must_use]
    pub fn delivered(&self) -> bool {
        matches!(self.status, AlertStatus::Sent | AlertStatus::PartiallySent)
    }

    pub(crate) fn summarize(channels: &BTreeMap<ChannelKind, ChannelStatus>) -> AlertStatus {
        let attempted = channels
            .values()
            .filter(|s| **s != ChannelStatus::Disabled)
            .count();
        let sent = channels
            .values()
            .filter(|s| **s == ChannelStatus::Sent)
            .count();

        if attempted == 0 {
            AlertStatus::Disabled
        } else if sent == attempted {
            AlertStatus::Sent
        } else if sent > 0 {
            AlertStatus::PartiallySent
        } else {
            AlertStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(list: &[(ChannelKind, ChannelStatus)]) -> BTreeMap<ChannelKind, ChannelStatus> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_summarize() {
        use ChannelKind::{Email, Telegram, Webhook};
        use ChannelStatus::{Disabled, Failed, Sent};

        assert_eq!(
            AlertOutcome::summarize(&statuses(&[(Telegram, Sent), (Email, Disabled)])),
            AlertStatus::Sent
        );
        assert_eq!(
            AlertOutcome::summarize(&statuses(&[(Telegram, Sent), (Webhook, Failed)])),
            AlertStatus::PartiallySent
        );
        assert_eq!(
            AlertOutcome::summarize(&statuses(&[(Telegram, Failed)])),
            AlertStatus::Failed
        );
        assert_eq!(
            AlertOutcome::summarize(&statuses(&[(Telegram, Disabled)])),
            AlertStatus::Disabled
        );
    }

    #[test]
    fn test_headline_carries_priority() {
        let alert = RenderedAlert {
            alert_type: types::KILL_SWITCH.to_string(),
            priority: AlertPriority::Critical,
            title: "Kill switch activated".to_string(),
            body: String::new(),
            data: Value::Null,
            timestamp: Utc::now(),
        };
        assert_eq!(alert.headline(), "[CRITICAL] Kill switch activated");
    }
}
