use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pre-trade rules, listed in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRule {
    KillSwitch,
    MaxOrderSize,
    MaxOpenOrders,
    MaxPositionSize,
    MaxDailyLoss,
    MaxDrawdown,
}

impl RiskRule {
    pub const PRIORITY: [Self; 6] = [
        Self::KillSwitch,
        Self::MaxOrderSize,
        Self::MaxOpenOrders,
        Self::MaxPositionSize,
        Self::MaxDailyLoss,
        Self::MaxDrawdown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KillSwitch => "kill_switch",
            Self::MaxOrderSize => "max_order_size",
            Self::MaxOpenOrders => "max_open_orders",
            Self::MaxPositionSize => "max_position_size",
            Self::MaxDailyLoss => "max_daily_loss",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for RiskRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first rule an order violated.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("risk limit exceeded [{rule}]: {message}")]
pub struct RiskLimitExceeded {
    pub rule: RiskRule,
    pub message: String,
}

impl RiskLimitExceeded {
    #[must_use]
    pub fn new(rule: RiskRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}
