//! EMA crossover trend following with an RSI filter.
//!
//! Exits are delegated to the risk manager's stop-loss, trailing-stop and
//! take-profit checks while a position is held.

use crate::context::StrategyContext;
use crate::indicators::{ema_series, last_cross, rsi, Cross};
use crate::kind::StrategyKind;
use crate::traits::{FillEffect, Strategy};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use autotrader_core::position::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

fn default_timeframe() -> String {
    "1h".to_string()
}
const fn default_short_ema() -> usize {
    12
}
const fn default_long_ema() -> usize {
    26
}
const fn default_rsi_period() -> usize {
    14
}
fn default_overbought() -> Decimal {
    Decimal::from(70)
}
fn default_oversold() -> Decimal {
    Decimal::from(30)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendParams {
    pub exchange: String,
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_short_ema")]
    pub short_ema: usize,
    #[serde(default = "default_long_ema")]
    pub long_ema: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_overbought")]
    pub rsi_overbought: Decimal,
    #[serde(default = "default_oversold")]
    pub rsi_oversold: Decimal,
    pub amount_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFollowingStrategy {
    params: TrendParams,
    #[serde(default)]
    position: Position,
    /// Highest close seen since entry, for the trailing stop.
    #[serde(default)]
    highest_since_entry: Option<Decimal>,
}

impl TrendFollowingStrategy {
    /// # Errors
    ///
    /// Returns an error if the short EMA is not shorter than the long EMA or
    /// the notional is not positive.
    pub fn new(params: TrendParams) -> Result<Self> {
        if params.short_ema == 0 || params.short_ema >= params.long_ema {
            bail!(
                "short_ema ({}) must be positive and below long_ema ({})",
                params.short_ema,
                params.long_ema
            );
        }
        if params.amount_usd <= Decimal::ZERO {
            bail!("amount_usd must be positive");
        }
        Ok(Self {
            params,
            position: Position::default(),
            highest_since_entry: None,
        })
    }

    fn history_needed(&self) -> usize {
        (self.params.long_ema + 1).max(self.params.rsi_period + 1) * 3
    }

    fn exit(&self, price: Decimal, ctx: &StrategyContext<'_>) -> Option<&'static str> {
        let entry = self.position.average_cost()?;
        let highest = self.highest_since_entry.unwrap_or(price);
        if ctx.risk.check_stop_loss(entry, price) {
            Some("stop loss")
        } else if ctx.risk.check_trailing_stop(highest, price) {
            Some("trailing stop")
        } else if ctx.risk.check_take_profit(entry, price) {
            Some("take profit")
        } else {
            None
        }
    }

    fn sell_all(&self, reason: String) -> TradeSignal {
        TradeSignal::market(
            &self.params.exchange,
            &self.params.symbol,
            OrderSide::Sell,
            self.position.quantity,
            reason,
        )
    }
}

#[async_trait]
impl Strategy for TrendFollowingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let candles = ctx
            .ohlcv(
                &self.params.exchange,
                &self.params.symbol,
                &self.params.timeframe,
                self.history_needed(),
            )
            .await?;
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let price = *closes.last().context("no candles returned")?;

        if self.position.is_open() {
            let highest = self.highest_since_entry.map_or(price, |h| h.max(price));
            self.highest_since_entry = Some(highest);
            if let Some(reason) = self.exit(price, ctx) {
                info!(symbol = %self.params.symbol, price = %price, reason, "Trend exit");
                return Ok(vec![self.sell_all(reason.to_string())]);
            }
        }

        let (Some(fast), Some(slow), Some(rsi)) = (
            ema_series(&closes, self.params.short_ema),
            ema_series(&closes, self.params.long_ema),
            rsi(&closes, self.params.rsi_period),
        ) else {
            debug!(symbol = %self.params.symbol, candles = closes.len(), "Not enough history");
            return Ok(Vec::new());
        };

        let signal = match last_cross(&fast, &slow) {
            Some(Cross::Bullish) if !self.position.is_open() && rsi < self.params.rsi_overbought => {
                let amount = (self.params.amount_usd / price).round_dp(8);
                Some(TradeSignal::market(
                    &self.params.exchange,
                    &self.params.symbol,
                    OrderSide::Buy,
                    amount,
                    format!("bullish EMA cross, RSI {}", rsi.round_dp(1)),
                ))
            }
            Some(Cross::Bearish) if self.position.is_open() && rsi > self.params.rsi_oversold => {
                Some(self.sell_all(format!("bearish EMA cross, RSI {}", rsi.round_dp(1))))
            }
            _ => None,
        };
        Ok(signal.into_iter().collect())
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        if fill.symbol != self.params.symbol {
            return Ok(FillEffect::default());
        }
        let realized = self.position.apply_fill(fill);
        self.highest_since_entry = if self.position.is_open() {
            Some(self.highest_since_entry.map_or(fill.price, |h| h.max(fill.price)))
        } else {
            None
        };
        Ok(FillEffect::realized(realized))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{candles, fill, Harness};
    use rust_decimal_macros::dec;

    fn trend() -> TrendFollowingStrategy {
        TrendFollowingStrategy::new(TrendParams {
            exchange: "binance".to_string(),
            symbol: "ETH/USDT".to_string(),
            timeframe: "1h".to_string(),
            short_ema: 3,
            long_ema: 6,
            rsi_period: 5,
            rsi_overbought: dec!(90),
            rsi_oversold: dec!(10),
            amount_usd: dec!(100),
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_inverted_emas() {
        let mut params = trend().params;
        params.short_ema = 30;
        assert!(TrendFollowingStrategy::new(params).is_err());
    }

    #[tokio::test]
    async fn test_bullish_cross_buys() {
        let h = Harness::new(&["binance"]);
        // Steady decline, then a jump that pulls the fast EMA above the slow one
        let mut closes: Vec<i64> = (0..20).map(|i| 120 - i).collect();
        closes.push(110);
        h.exchange
            .set_candles("binance", "ETH/USDT", "1h", candles(&closes));

        let mut trend = trend();
        let signals = trend.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Buy);
    }

    #[tokio::test]
    async fn test_stop_loss_exit_while_holding() {
        let h = Harness::new(&["binance"]);
        let closes: Vec<i64> = vec![100; 30];
        h.exchange
            .set_candles("binance", "ETH/USDT", "1h", candles(&closes));

        let mut trend = trend();
        trend
            .on_order_filled(&fill("ETH/USDT", OrderSide::Buy, dec!(1), dec!(110)))
            .unwrap();

        let signals = trend.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::Sell);
        assert_eq!(signals[0].amount, dec!(1));
        assert_eq!(signals[0].reason, "stop loss");
    }

    #[tokio::test]
    async fn test_flat_market_is_quiet() {
        let h = Harness::new(&["binance"]);
        h.exchange
            .set_candles("binance", "ETH/USDT", "1h", candles(&[100; 30]));
        let mut trend = trend();
        assert!(trend.evaluate(&h.ctx()).await.unwrap().is_empty());
    }
}
