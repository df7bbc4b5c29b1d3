use crate::alert::types;
use autotrader_core::config::{AlertPriority, AlertRuleConfig, ChannelKind};
use std::collections::HashMap;

/// Where an alert goes and how loudly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub channels: Vec<ChannelKind>,
    pub priority: AlertPriority,
}

/// Alert type to route mapping.
///
/// Configured rules replace built-in ones for the same type. Types with no
/// rule go to the default channel at normal priority.
#[derive(Debug, Clone)]
pub struct RuleSet {
    routes: HashMap<String, Route>,
    default_channel: ChannelKind,
}

impl RuleSet {
    #[must_use]
    pub fn new(configured: &[AlertRuleConfig], default_channel: ChannelKind) -> Self {
        let mut routes = builtin_routes();
        for rule in configured {
            routes.insert(
                rule.alert_type.clone(),
                Route {
                    channels: rule.channels.clone(),
                    priority: rule.priority,
                },
            );
        }
        Self {
            routes,
            default_channel,
        }
    }

    #[must_use]
    pub fn resolve(&self, alert_type: &str) -> Route {
        self.routes.get(alert_type).cloned().unwrap_or(Route {
            channels: vec![self.default_channel],
            priority: AlertPriority::Normal,
        })
    }
}

fn builtin_routes() -> HashMap<String, Route> {
    use ChannelKind::{Email, Telegram, Webhook};

    let table: [(&str, &[ChannelKind], AlertPriority); 10] = [
        (types::KILL_SWITCH, &[Telegram, Webhook, Email], AlertPriority::Critical),
        (types::RISK_LIMIT, &[Telegram, Email], AlertPriority::High),
        (types::RISK_WARNING, &[Telegram, Email], AlertPriority::High),
        (types::TRADE_EXECUTED, &[Telegram], AlertPriority::Normal),
        (types::ORDER_FAILED, &[Telegram], AlertPriority::High),
        (types::STRATEGY_ERROR, &[Telegram], AlertPriority::High),
        (types::DAILY_SUMMARY, &[Email, Telegram], AlertPriority::Low),
        (types::DAEMON_STARTED, &[Telegram], AlertPriority::Normal),
        (types::DAEMON_STOPPED, &[Telegram], AlertPriority::Normal),
        (types::SENTIMENT_ALERT, &[Telegram], AlertPriority::Low),
    ];

    table
        .into_iter()
        .map(|(alert_type, channels, priority)| {
            (
                alert_type.to_string(),
                Route {
                    channels: channels.to_vec(),
                    priority,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_switch_goes_everywhere() {
        let rules = RuleSet::new(&[], ChannelKind::Telegram);
        let route = rules.resolve(types::KILL_SWITCH);
        assert_eq!(route.priority, AlertPriority::Critical);
        assert_eq!(route.channels.len(), ChannelKind::ALL.len());
    }

    #[test]
    fn test_unmatched_type_uses_default_channel() {
        let rules = RuleSet::new(&[], ChannelKind::Webhook);
        let route = rules.resolve("funding_rate_spike");
        assert_eq!(route.channels, vec![ChannelKind::Webhook]);
        assert_eq!(route.priority, AlertPriority::Normal);
    }

    #[test]
    fn test_configured_rule_replaces_builtin() {
        let rules = RuleSet::new(
            &[AlertRuleConfig {
                alert_type: types::TRADE_EXECUTED.to_string(),
                channels: vec![ChannelKind::Webhook],
                priority: AlertPriority::Low,
            }],
            ChannelKind::Telegram,
        );
        let route = rules.resolve(types::TRADE_EXECUTED);
        assert_eq!(route.channels, vec![ChannelKind::Webhook]);
        assert_eq!(route.priority, AlertPriority::Low);
    }
}
