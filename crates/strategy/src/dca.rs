//! Dollar-cost averaging: a fixed quote amount bought at a fixed interval.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{FillEffect, Strategy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrader_core::clock::saturating_secs;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const fn default_interval_secs() -> u64 {
    86_400
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcaParams {
    pub exchange: String,
    pub symbol: String,
    pub amount_usd: Decimal,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Stops buying once this much has been invested.
    #[serde(default)]
    pub max_investment: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaStrategy {
    params: DcaParams,
    #[serde(default)]
    last_buy_at: Option<DateTime<Utc>>,
    #[serde(default)]
    total_invested: Decimal,
    #[serde(default)]
    total_bought: Decimal,
}

impl DcaStrategy {
    /// # Errors
    ///
    /// Returns an error if `amount_usd` is not positive or the interval is zero.
    pub fn new(params: DcaParams) -> Result<Self> {
        if params.amount_usd <= Decimal::ZERO {
            bail!("amount_usd must be positive");
        }
        if params.interval_secs == 0 {
            bail!("interval_secs must be positive");
        }
        Ok(Self {
            params,
            last_buy_at: None,
            total_invested: Decimal::ZERO,
            total_bought: Decimal::ZERO,
        })
    }

    /// `total_invested / total_bought`, or `None` before the first fill.
    #[must_use]
    pub fn average_cost(&self) -> Option<Decimal> {
        if self.total_bought.is_zero() {
            None
        } else {
            Some(self.total_invested / self.total_bought)
        }
    }

    #[must_use]
    pub const fn total_invested(&self) -> Decimal {
        self.total_invested
    }

    fn interval_elapsed(&self, now: DateTime<Utc>) -> bool {
        let interval = saturating_secs(self.params.interval_secs);
        self.last_buy_at.map_or(true, |last| now - last >= interval)
    }

    fn budget(&self) -> Decimal {
        match self.params.max_investment {
            Some(cap) => self.params.amount_usd.min(cap - self.total_invested),
            None => self.params.amount_usd,
        }
    }
}

#[async_trait]
impl Strategy for DcaStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dca
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        if !self.interval_elapsed(ctx.now) {
            return Ok(Vec::new());
        }
        let spend = self.budget();
        if spend <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let ask = ctx.ticker(&self.params.exchange, &self.params.symbol).await?.ask;
        if ask <= Decimal::ZERO {
            bail!("no ask price for {}", self.params.symbol);
        }
        let amount = (spend / ask).round_dp(8);
        self.last_buy_at = Some(ctx.now);

        info!(symbol = %self.params.symbol, spend = %spend, amount = %amount, "DCA buy due");
        Ok(vec![TradeSignal::market(
            &self.params.exchange,
            &self.params.symbol,
            OrderSide::Buy,
            amount,
            format!("scheduled DCA buy of {spend}"),
        )])
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        if fill.side == OrderSide::Buy && fill.symbol == self.params.symbol {
            self.total_invested += fill.notional() + fill.fee;
            self.total_bought += fill.amount;
        }
        Ok(FillEffect::default())
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fill, Harness};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn dca(max_investment: Option<Decimal>) -> DcaStrategy {
        DcaStrategy::new(DcaParams {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            amount_usd: dec!(100),
            interval_secs: 3600,
            max_investment,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_buys_once_per_interval() {
        let h = Harness::new(&["binance"]);
        h.exchange.set_ticker("binance", "BTC/USDT", dec!(49), dec!(50));
        let mut dca = dca(None);

        let first = dca.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].amount, dec!(2));

        assert!(dca.evaluate(&h.ctx()).await.unwrap().is_empty());

        let mut later = h.ctx();
        later.now += Duration::hours(1);
        assert_eq!(dca.evaluate(&later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cap_limits_final_buy_then_stops() {
        let h = Harness::new(&["binance"]);
        h.exchange.set_ticker("binance", "BTC/USDT", dec!(50), dec!(50));
        let mut dca = dca(Some(dec!(150)));
        dca.on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(2), dec!(50)))
            .unwrap();

        let signals = dca.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals[0].amount, dec!(1));

        dca.on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(1), dec!(50)))
            .unwrap();
        let mut later = h.ctx();
        later.now += Duration::days(2);
        assert!(dca.evaluate(&later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_interval_buys_once() {
        let h = Harness::new(&["binance"]);
        h.exchange.set_ticker("binance", "BTC/USDT", dec!(49), dec!(50));
        let mut dca = DcaStrategy::new(DcaParams {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            amount_usd: dec!(100),
            interval_secs: u64::MAX,
            max_investment: None,
        })
        .unwrap();

        assert_eq!(dca.evaluate(&h.ctx()).await.unwrap().len(), 1);
        let mut later = h.ctx();
        later.now += Duration::days(3650);
        assert!(dca.evaluate(&later).await.unwrap().is_empty());
    }

    #[test]
    fn test_average_cost() {
        let mut dca = dca(None);
        assert_eq!(dca.average_cost(), None);
        dca.on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(1), dec!(100)))
            .unwrap();
        dca.on_order_filled(&fill("BTC/USDT", OrderSide::Buy, dec!(3), dec!(60)))
            .unwrap();
        // (100 + 180) / 4
        assert_eq!(dca.average_cost(), Some(dec!(70)));
    }
}
