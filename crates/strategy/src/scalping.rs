//! Order-book scalping.
//!
//! Joins the best bid when the spread is tight and resting bid depth
//! outweighs ask depth, then exits at a small target or stop.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{FillEffect, Strategy};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use autotrader_core::clock::saturating_secs;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use autotrader_core::position::Position;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

fn default_max_spread_pct() -> Decimal {
    Decimal::new(1, 1)
}
fn default_imbalance_ratio() -> Decimal {
    Decimal::new(15, 1)
}
fn default_target_pct() -> Decimal {
    Decimal::new(3, 1)
}
fn default_stop_pct() -> Decimal {
    Decimal::new(2, 1)
}
const fn default_max_trades_per_hour() -> usize {
    20
}
const fn default_depth() -> usize {
    10
}
const fn default_entry_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalpingParams {
    pub exchange: String,
    pub symbol: String,
    #[serde(default = "default_max_spread_pct")]
    pub max_spread_pct: Decimal,
    /// Minimum bid depth / ask depth to enter.
    #[serde(default = "default_imbalance_ratio")]
    pub imbalance_ratio: Decimal,
    #[serde(default = "default_target_pct")]
    pub target_pct: Decimal,
    #[serde(default = "default_stop_pct")]
    pub stop_pct: Decimal,
    pub amount: Decimal,
    #[serde(default = "default_max_trades_per_hour")]
    pub max_trades_per_hour: usize,
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// After this long an unfilled entry no longer blocks a new one.
    #[serde(default = "default_entry_timeout_secs")]
    pub entry_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalpingStrategy {
    params: ScalpingParams,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    entries: Vec<DateTime<Utc>>,
    #[serde(default)]
    pending_entry_at: Option<DateTime<Utc>>,
}

impl ScalpingStrategy {
    /// # Errors
    ///
    /// Returns an error if `amount` or the exit thresholds are not positive.
    pub fn new(params: ScalpingParams) -> Result<Self> {
        if params.amount <= Decimal::ZERO {
            bail!("amount must be positive");
        }
        if params.target_pct <= Decimal::ZERO || params.stop_pct <= Decimal::ZERO {
            bail!("target_pct and stop_pct must be positive");
        }
        Ok(Self {
            params,
            position: Position::default(),
            entries: Vec::new(),
            pending_entry_at: None,
        })
    }

    fn exit_reason(&self, bid: Decimal) -> Option<String> {
        let entry = self.position.average_cost()?;
        if entry <= Decimal::ZERO {
            return None;
        }
        let change_pct = (bid - entry) / entry * Decimal::ONE_HUNDRED;
        if change_pct >= self.params.target_pct {
            Some(format!("target hit (+{}%)", change_pct.round_dp(3)))
        } else if -change_pct >= self.params.stop_pct {
            Some(format!("stop hit ({}%)", change_pct.round_dp(3)))
        } else {
            None
        }
    }
}

#[async_trait]
impl Strategy for ScalpingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Scalping
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let p = &self.params;
        let book = ctx.orderbook(&p.exchange, &p.symbol, p.depth).await?;
        let bid = book.best_bid().context("order book has no bids")?;
        let ask = book.best_ask().context("order book has no asks")?;

        if self.position.is_open() {
            return Ok(self
                .exit_reason(bid)
                .map(|reason| {
                    TradeSignal::market(
                        &p.exchange,
                        &p.symbol,
                        OrderSide::Sell,
                        self.position.quantity,
                        reason,
                    )
                })
                .into_iter()
                .collect());
        }

        if let Some(placed_at) = self.pending_entry_at {
            if ctx.now - placed_at < saturating_secs(p.entry_timeout_secs) {
                return Ok(Vec::new());
            }
            self.pending_entry_at = None;
        }

        let hour_ago = ctx.now - Duration::hours(1);
        self.entries.retain(|t| *t > hour_ago);
        if self.entries.len() >= p.max_trades_per_hour {
            debug!(symbol = %p.symbol, "Hourly scalping budget used");
            return Ok(Vec::new());
        }

        let mid = (bid + ask) / Decimal::TWO;
        if mid <= Decimal::ZERO {
            return Ok(Vec::new());
        }
        let spread_pct = (ask - bid) / mid * Decimal::ONE_HUNDRED;
        let ask_depth = book.ask_depth(p.depth);
        if spread_pct > p.max_spread_pct || ask_depth <= Decimal::ZERO {
            return Ok(Vec::new());
        }
        let ratio = book.bid_depth(p.depth) / ask_depth;
        if ratio < p.imbalance_ratio {
            return Ok(Vec::new());
        }

        let signal = TradeSignal::limit(
            &p.exchange,
            &p.symbol,
            OrderSide::Buy,
            p.amount,
            bid,
            format!("spread {}%, depth ratio {}", spread_pct.round_dp(3), ratio.round_dp(2)),
        );
        self.entries.push(ctx.now);
        self.pending_entry_at = Some(ctx.now);
        Ok(vec![signal])
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        if fill.symbol != self.params.symbol {
            return Ok(FillEffect::default());
        }
        if fill.side == OrderSide::Buy {
            self.pending_entry_at = None;
        }
        Ok(FillEffect::realized(self.position.apply_fill(fill)))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fill, Harness};
    use autotrader_core::market::{BookLevel, OrderBook};
    use rust_decimal_macros::dec;

    fn scalper(max_trades_per_hour: usize) -> ScalpingStrategy {
        ScalpingStrategy::new(ScalpingParams {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            max_spread_pct: dec!(0.1),
            imbalance_ratio: dec!(1.5),
            target_pct: dec!(0.3),
            stop_pct: dec!(0.2),
            amount: dec!(0.01),
            max_trades_per_hour,
            depth: 10,
            entry_timeout_secs: 600,
        })
        .unwrap()
    }

    fn book(bid: Decimal, bid_amt: Decimal, ask: Decimal, ask_amt: Decimal) -> OrderBook {
        OrderBook {
            symbol: "BTC/USDT".to_string(),
            bids: vec![BookLevel {
                price: bid,
                amount: bid_amt,
            }],
            asks: vec![BookLevel {
                price: ask,
                amount: ask_amt,
            }],
        }
    }

    #[tokio::test]
    async fn test_enters_on_tight_spread_and_bid_pressure() {
        let h = Harness::new(&["binance"]);
        h.exchange
            .set_orderbook("binance", book(dec!(1000), dec!(3), dec!(1000.5), dec!(1)));

        let mut scalper = scalper(20);
        let signals = scalper.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].price, Some(dec!(1000)));

        // waits for the resting entry instead of stacking another
        assert!(scalper.evaluate(&h.ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skips_wide_spread_or_balanced_book() {
        let h = Harness::new(&["binance"]);
        let mut scalper = scalper(20);

        h.exchange
            .set_orderbook("binance", book(dec!(1000), dec!(3), dec!(1010), dec!(1)));
        assert!(scalper.evaluate(&h.ctx()).await.unwrap().is_empty());

        h.exchange
            .set_orderbook("binance", book(dec!(1000), dec!(1), dec!(1000.5), dec!(1)));
        assert!(scalper.evaluate(&h.ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exits_at_target() {
        let h = Harness::new(&["binance"]);
        let mut scalper = scalper(20);
        scalper
            .on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(0.01), dec!(1000)))
            .unwrap();

        h.exchange
            .set_orderbook("binance", book(dec!(1003), dec!(1), dec!(1004), dec!(1)));
        let signals = scalper.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals[0].side, OrderSide::Sell);
        assert_eq!(signals[0].amount, dec!(0.01));
    }

    #[tokio::test]
    async fn test_hourly_budget() {
        let h = Harness::new(&["binance"]);
        h.exchange
            .set_orderbook("binance", book(dec!(1000), dec!(3), dec!(1000.5), dec!(1)));
        let mut scalper = scalper(1);

        assert_eq!(scalper.evaluate(&h.ctx()).await.unwrap().len(), 1);
        let mut later = h.ctx();
        later.now += Duration::minutes(15);
        assert!(scalper.evaluate(&later).await.unwrap().is_empty());
    }
}
