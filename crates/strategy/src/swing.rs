//! Swing trading between recent support and resistance.

use crate::context::StrategyContext;
use crate::indicators::rsi;
use crate::kind::StrategyKind;
use crate::traits::{FillEffect, Strategy};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use autotrader_core::position::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

fn default_timeframe() -> String {
    "4h".to_string()
}
const fn default_lookback() -> usize {
    20
}
const fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> Decimal {
    Decimal::from(35)
}
fn default_overbought() -> Decimal {
    Decimal::from(65)
}
fn default_proximity_pct() -> Decimal {
    Decimal::TWO
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingParams {
    pub exchange: String,
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Candles used to find support and resistance.
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_oversold")]
    pub rsi_oversold: Decimal,
    #[serde(default = "default_overbought")]
    pub rsi_overbought: Decimal,
    /// How close to a level, in percent, counts as "at" it.
    #[serde(default = "default_proximity_pct")]
    pub proximity_pct: Decimal,
    pub amount_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingStrategy {
    params: SwingParams,
    #[serde(default)]
    position: Position,
}

impl SwingStrategy {
    /// # Errors
    ///
    /// Returns an error if `lookback` is below 2 or the notional is not positive.
    pub fn new(params: SwingParams) -> Result<Self> {
        if params.lookback < 2 {
            bail!("lookback must be at least 2");
        }
        if params.amount_usd <= Decimal::ZERO {
            bail!("amount_usd must be positive");
        }
        Ok(Self {
            params,
            position: Position::default(),
        })
    }

    fn market(&self, side: OrderSide, amount: Decimal, reason: String) -> TradeSignal {
        TradeSignal::market(&self.params.exchange, &self.params.symbol, side, amount, reason)
    }
}

#[async_trait]
impl Strategy for SwingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Swing
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let p = &self.params;
        let limit = p.lookback.max(p.rsi_period + 1) + 1;
        let candles = ctx.ohlcv(&p.exchange, &p.symbol, &p.timeframe, limit).await?;
        let price = candles.last().context("no candles returned")?.close;

        let window = &candles[candles.len().saturating_sub(p.lookback)..];
        let support = window.iter().map(|c| c.low).min().context("empty window")?;
        let resistance = window.iter().map(|c| c.high).max().context("empty window")?;

        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let Some(rsi) = rsi(&closes, p.rsi_period) else {
            debug!(symbol = %p.symbol, candles = closes.len(), "Not enough history");
            return Ok(Vec::new());
        };
        let near = p.proximity_pct / Decimal::ONE_HUNDRED;

        if self.position.is_open() {
            let entry = self.position.average_cost().unwrap_or(price);
            if ctx.risk.check_stop_loss(entry, price) {
                return Ok(vec![self.market(
                    OrderSide::Sell,
                    self.position.quantity,
                    "stop loss".to_string(),
                )]);
            }
            if price >= resistance * (Decimal::ONE - near) && rsi > p.rsi_overbought {
                return Ok(vec![self.market(
                    OrderSide::Sell,
                    self.position.quantity,
                    format!("near resistance {resistance}, RSI {}", rsi.round_dp(1)),
                )]);
            }
            return Ok(Vec::new());
        }

        if price <= support * (Decimal::ONE + near) && rsi < p.rsi_oversold {
            let amount = (p.amount_usd / price).round_dp(8);
            return Ok(vec![self.market(
                OrderSide::Buy,
                amount,
                format!("near support {support}, RSI {}", rsi.round_dp(1)),
            )]);
        }
        Ok(Vec::new())
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        if fill.symbol != self.params.symbol {
            return Ok(FillEffect::default());
        }
        Ok(FillEffect::realized(self.position.apply_fill(fill)))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
