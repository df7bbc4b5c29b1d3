//! Fixed per-type message templates.
//!
//! Unknown alert types fall back to a `key: value` dump of their data.

use crate::alert::{types, RenderedAlert};
use autotrader_core::config::AlertPriority;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[must_use]
pub fn render(
    alert_type: &str,
    priority: AlertPriority,
    data: &Value,
    timestamp: DateTime<Utc>,
) -> RenderedAlert {
    let f = |key: &str| field(data, key);
    let (title, body) = match alert_type {
        types::KILL_SWITCH => (
            "Kill switch activated".to_string(),
            format!(
                "All trading is halted.\nReason: {}\nOrders cancelled: {}",
                f("reason"),
                f("orders_cancelled")
            ),
        ),
        types::RISK_LIMIT => (
            format!("Risk limit hit: {}", f("rule")),
            format!(
                "Strategy: {}\nSymbol: {}\n{}",
                f("strategy"),
                f("symbol"),
                f("message")
            ),
        ),
        types::RISK_WARNING => (
            format!("Approaching {} limit", f("rule")),
            format!(
                "Current: {}%\nLimit: {}%\nUtilization: {}%",
                f("value_pct"),
                f("limit_pct"),
                f("utilization_pct")
            ),
        ),
        types::TRADE_EXECUTED => (
            format!("{} {} {}", f("side"), f("amount"), f("symbol")),
            format!(
                "Price: {}\nExchange: {}\nStrategy: {}\nRealized P&L: {}",
                f("price"),
                f("exchange"),
                f("strategy"),
                f("pnl")
            ),
        ),
        types::ORDER_FAILED => (
            format!("Order failed: {} {}", f("side"), f("symbol")),
            format!(
                "Exchange: {}\nStrategy: {}\nError: {}",
                f("exchange"),
                f("strategy"),
                f("error")
            ),
        ),
        types::STRATEGY_ERROR => (
            format!("Strategy error: {}", f("strategy")),
            f("error"),
        ),
        types::DAILY_SUMMARY => (
            format!("Daily summary {}", f("date")),
            format!(
                "P&L: {}\nTrades: {}\nPortfolio: {}\nDrawdown: {}%",
                f("daily_pnl"),
                f("trades_today"),
                f("portfolio_value"),
                f("drawdown_pct")
            ),
        ),
        types::DAEMON_STARTED => (
            "Daemon started".to_string(),
            format!("PID: {}\nStrategies: {}", f("pid"), f("strategies")),
        ),
        types::DAEMON_STOPPED => (
            "Daemon stopped".to_string(),
            format!("Passes: {}\nChecks: {}", f("passes"), f("checks_performed")),
        ),
        types::SENTIMENT_ALERT => (
            format!("Sentiment {} on {}", f("label"), f("symbol")),
            format!("Score: {}", f("score")),
        ),
        other => (other.replace('_', " "), dump(data)),
    };

    RenderedAlert {
        alert_type: alert_type.to_string(),
        priority,
        title,
        body,
        data: data.clone(),
        timestamp,
    }
}

fn field(data: &Value, key: &str) -> String {
    match data.get(key) {
        None | Some(Value::Null) => "-".to_string(),
        Some(value) => display(value),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn dump(data: &Value) -> String {
    match data {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", display(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => display(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_type_uses_template() {
        let alert = render(
            types::KILL_SWITCH,
            AlertPriority::Critical,
            &json!({ "reason": "drawdown", "orders_cancelled": 3 }),
            Utc::now(),
        );
        assert_eq!(alert.title, "Kill switch activated");
        assert!(alert.body.contains("Reason: drawdown"));
        assert!(alert.body.contains("Orders cancelled: 3"));
    }

    #[test]
    fn test_missing_fields_render_as_dash() {
        let alert = render(types::STRATEGY_ERROR, AlertPriority::High, &json!({}), Utc::now());
        assert_eq!(alert.title, "Strategy error: -");
    }

    #[test]
    fn test_unknown_type_dumps_key_values() {
        let alert = render(
            "funding_spike",
            AlertPriority::Normal,
            &json!({ "rate": 0.01, "symbol": "BTC/USDT" }),
            Utc::now(),
        );
        assert_eq!(alert.title, "funding spike");
        assert_eq!(alert.body, "rate: 0.01\nsymbol: BTC/USDT");
    }
}
