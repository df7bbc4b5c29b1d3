use autotrader_core::events::OrderSide;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One realized trade as recorded by the risk ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub strategy: Option<String>,
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
    /// Realized profit or loss attributed to this trade.
    pub pnl: Decimal,
}

/// Global risk ledger persisted to `risk_state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// UTC day the daily counters belong to.
    pub date: NaiveDate,
    pub daily_pnl: Decimal,
    /// Highest portfolio value ever observed. Never decreases.
    pub portfolio_ath: Decimal,
    pub current_portfolio_value: Decimal,
    pub trades_today: u32,
    pub killed: bool,
    #[serde(default)]
    pub kill_reason: Option<String>,
    #[serde(default)]
    pub killed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trade_log: Vec<TradeRecord>,
}

impl RiskState {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: today,
            daily_pnl: Decimal::ZERO,
            portfolio_ath: Decimal::ZERO,
            current_portfolio_value: Decimal::ZERO,
            trades_today: 0,
            killed: false,
            kill_reason: None,
            killed_at: None,
            trade_log: Vec::new(),
        }
    }

    /// Moves the daily bucket to `today`, zeroing it if the day changed.
    ///
    /// Returns `true` when a reset happened.
    pub fn roll_to(&mut self, today: NaiveDate) -> bool {
        if self.date == today {
            return false;
        }
        self.date = today;
        self.daily_pnl = Decimal::ZERO;
        self.trades_today = 0;
        true
    }

    /// Records the latest portfolio value, raising the all-time high if exceeded.
    ///
    /// Returns `true` when the stored state changed.
    pub fn observe_portfolio_value(&mut self, value: Decimal) -> bool {
        let mut changed = self.current_portfolio_value != value;
        self.current_portfolio_value = value;
        if value > self.portfolio_ath {
            self.portfolio_ath = value;
            changed = true;
        }
        changed
    }

    /// Decline of the current value from the all-time high, in percent.
    #[must_use]
    pub fn drawdown_pct(&self) -> Decimal {
        if self.portfolio_ath <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.portfolio_ath - self.current_portfolio_value) / self.portfolio_ath
            * Decimal::ONE_HUNDRED
    }

    /// Today's realized loss as a percentage of `portfolio_value`; zero when in profit.
    #[must_use]
    pub fn daily_loss_pct(&self, portfolio_value: Decimal) -> Decimal {
        if self.daily_pnl >= Decimal::ZERO || portfolio_value <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        -self.daily_pnl / portfolio_value * Decimal::ONE_HUNDRED
    }

    pub(crate) fn push_trade(&mut self, trade: TradeRecord, limit: usize) {
        self.trade_log.push(trade);
        if self.trade_log.len() > limit {
            let excess = self.trade_log.len() - limit;
            self.trade_log.drain(..excess);
        }
    }
}
