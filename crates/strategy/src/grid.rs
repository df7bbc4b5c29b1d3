//! Grid trading.
//!
//! Maintains standing limit orders at `num_grids + 1` evenly spaced levels
//! between the configured bounds. Every fill is answered with the opposite
//! order one level away, so the grid harvests oscillation inside the range.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{Activation, FillEffect, Strategy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use autotrader_core::position::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

const fn default_num_grids() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridParams {
    pub exchange: String,
    pub symbol: String,
    /// `[lower, upper]`
    pub price_range: [Decimal; 2],
    #[serde(default = "default_num_grids")]
    pub num_grids: u32,
    pub amount_per_grid: Decimal,
}

/// A level with an order the grid expects to be resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLevel {
    pub price: Decimal,
    pub side: OrderSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridStrategy {
    params: GridParams,
    lower: Decimal,
    upper: Decimal,
    #[serde(default)]
    seeded: bool,
    #[serde(default)]
    pending: Vec<PendingLevel>,
    #[serde(default)]
    position: Position,
}

impl GridStrategy {
    /// # Errors
    ///
    /// Returns an error if the range is empty or inverted, `num_grids` is zero,
    /// or the per-level amount is not positive.
    pub fn new(params: GridParams) -> Result<Self> {
        let [lower, upper] = params.price_range;
        if lower <= Decimal::ZERO || upper <= lower {
            bail!("price_range must satisfy 0 < lower < upper, got [{lower}, {upper}]");
        }
        if params.num_grids == 0 {
            bail!("num_grids must be at least 1");
        }
        if params.amount_per_grid <= Decimal::ZERO {
            bail!("amount_per_grid must be positive");
        }
        Ok(Self {
            params,
            lower,
            upper,
            seeded: false,
            pending: Vec::new(),
            position: Position::default(),
        })
    }

    #[must_use]
    pub fn spacing(&self) -> Decimal {
        (self.upper - self.lower) / Decimal::from(self.params.num_grids)
    }

    /// Current price levels, lowest first.
    #[must_use]
    pub fn levels(&self) -> Vec<Decimal> {
        let spacing = self.spacing();
        (0..=self.params.num_grids)
            .map(|i| self.lower + spacing * Decimal::from(i))
            .collect()
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingLevel] {
        &self.pending
    }

    #[must_use]
    pub const fn bounds(&self) -> (Decimal, Decimal) {
        (self.lower, self.upper)
    }

    #[must_use]
    pub const fn position(&self) -> &Position {
        &self.position
    }

    fn recenter(&mut self, price: Decimal) {
        let half_width = (self.upper - self.lower) / Decimal::TWO;
        let previous = (self.lower, self.upper);
        self.lower = price - half_width;
        self.upper = price + half_width;
        self.pending.clear();
        self.seeded = false;
        info!(
            symbol = %self.params.symbol,
            price = %price,
            old_lower = %previous.0,
            old_upper = %previous.1,
            lower = %self.lower,
            upper = %self.upper,
            "Grid breakout, re-centering range"
        );
    }

    fn seed(&mut self, price: Decimal) -> Vec<TradeSignal> {
        let mut signals = Vec::new();
        for level in self.levels() {
            if level <= Decimal::ZERO || level == price {
                continue;
            }
            let side = if level < price {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            signals.push(self.level_order(side, level, self.params.amount_per_grid, "grid level"));
            self.pending.push(PendingLevel { price: level, side });
        }
        self.seeded = true;
        debug!(symbol = %self.params.symbol, orders = signals.len(), "Seeded grid");
        signals
    }

    fn level_order(&self, side: OrderSide, price: Decimal, amount: Decimal, reason: &str) -> TradeSignal {
        TradeSignal::limit(
            &self.params.exchange,
            &self.params.symbol,
            side,
            amount,
            price,
            format!("{reason} {side} @ {price}"),
        )
    }
}

#[async_trait]
impl Strategy for GridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Grid
    }

    async fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Result<Activation> {
        info!(
            symbol = %self.params.symbol,
            lower = %self.lower,
            upper = %self.upper,
            spacing = %self.spacing(),
            "Grid strategy starting"
        );
        Ok(Activation::Active)
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let price = ctx.ticker(&self.params.exchange, &self.params.symbol).await?.last;

        if self.seeded && (price < self.lower || price > self.upper) {
            self.recenter(price);
        }
        if self.seeded {
            return Ok(Vec::new());
        }
        Ok(self.seed(price))
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        if fill.symbol != self.params.symbol {
            return Ok(FillEffect::default());
        }
        if let Some(idx) = self
            .pending
            .iter()
            .position(|p| p.price == fill.price && p.side == fill.side)
        {
            self.pending.remove(idx);
        }

        let realized = self.position.apply_fill(fill);
        let spacing = self.spacing();
        let counter_price = match fill.side {
            OrderSide::Buy => fill.price + spacing,
            OrderSide::Sell => fill.price - spacing,
        };
        let effect = FillEffect::realized(realized);
        if counter_price <= Decimal::ZERO {
            return Ok(effect);
        }

        let side = fill.side.opposite();
        self.pending.push(PendingLevel {
            price: counter_price,
            side,
        });
        Ok(effect.with_follow_up(self.level_order(side, counter_price, fill.amount, "grid counter")))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fill, Harness};
    use autotrader_core::events::OrderType;
    use rust_decimal_macros::dec;

    fn grid() -> GridStrategy {
        GridStrategy::new(GridParams {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            price_range: [dec!(90000), dec!(110000)],
            num_grids: 10,
            amount_per_grid: dec!(0.001),
        })
        .unwrap()
    }

    #[test]
    fn test_eleven_levels_spaced_2000() {
        let grid = grid();
        let levels = grid.levels();
        assert_eq!(levels.len(), 11);
        assert_eq!(levels[0], dec!(90000));
        assert_eq!(levels[10], dec!(110000));
        assert!(levels.windows(2).all(|w| w[1] - w[0] == dec!(2000)));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let result = GridStrategy::new(GridParams {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            price_range: [dec!(110000), dec!(90000)],
            num_grids: 10,
            amount_per_grid: dec!(0.001),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_buy_fill_schedules_sell_one_level_up() {
        let mut grid = grid();
        let effect = grid
            .on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(0.001), dec!(92000)))
            .unwrap();

        let counter = effect.follow_up.unwrap();
        assert_eq!(counter.side, OrderSide::Sell);
        assert_eq!(counter.price, Some(dec!(94000)));
        assert_eq!(counter.order_type, OrderType::Limit);
        assert_eq!(counter.amount, dec!(0.001));
    }

    #[test]
    fn test_sell_fill_schedules_buy_one_level_down() {
        let mut grid = grid();
        grid.on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(0.001), dec!(90000)))
            .unwrap();
        let effect = grid
            .on_order_filled(&fill("BTC/USDT", OrderSide::Sell, dec!(0.001), dec!(92000)))
            .unwrap();

        assert_eq!(effect.realized_pnl, dec!(2));
        let counter = effect.follow_up.unwrap();
        assert_eq!(counter.side, OrderSide::Buy);
        assert_eq!(counter.price, Some(dec!(90000)));
    }

    #[tokio::test]
    async fn test_first_evaluation_seeds_both_sides() {
        let h = Harness::new(&["binance"]);
        h.exchange
            .set_ticker("binance", "BTC/USDT", dec!(100000), dec!(100000));
        let mut grid = grid();

        let signals = grid.evaluate(&h.ctx()).await.unwrap();
        // 100000 itself is skipped
        assert_eq!(signals.len(), 10);
        assert_eq!(signals.iter().filter(|s| s.side == OrderSide::Buy).count(), 5);
        assert!(signals
            .iter()
            .filter(|s| s.side == OrderSide::Sell)
            .all(|s| s.price.unwrap() > dec!(100000)));

        assert!(grid.evaluate(&h.ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_breakout_recenters_and_reseeds() {
        let h = Harness::new(&["binance"]);
        h.exchange
            .set_ticker("binance", "BTC/USDT", dec!(100000), dec!(100000));
        let mut grid = grid();
        grid.evaluate(&h.ctx()).await.unwrap();

        h.exchange
            .set_ticker("binance", "BTC/USDT", dec!(120000), dec!(120000));
        let signals = grid.evaluate(&h.ctx()).await.unwrap();

        assert_eq!(grid.bounds(), (dec!(110000), dec!(130000)));
        assert_eq!(signals.len(), 10);
        assert_eq!(grid.pending().len(), 10);
    }
}
