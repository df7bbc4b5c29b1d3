//! Mirrors orders observed on a source account onto a target exchange.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{Activation, FillEffect, Strategy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, OrderType, TradeSignal};
use autotrader_core::market::OpenOrder;
use autotrader_core::position::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const fn default_copy_ratio() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyTradingParams {
    pub source_exchange: String,
    pub target_exchange: String,
    /// Only these symbols are copied; empty copies everything.
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default = "default_copy_ratio")]
    pub copy_ratio: Decimal,
    #[serde(default)]
    pub max_order_usd: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyTradingStrategy {
    params: CopyTradingParams,
    /// Source order ids already handled.
    #[serde(default)]
    seen: BTreeSet<String>,
    #[serde(default)]
    positions: BTreeMap<String, Position>,
}

impl CopyTradingStrategy {
    /// # Errors
    ///
    /// Returns an error if `copy_ratio` is not positive.
    pub fn new(params: CopyTradingParams) -> Result<Self> {
        if params.copy_ratio <= Decimal::ZERO {
            bail!("copy_ratio must be positive");
        }
        Ok(Self {
            params,
            seen: BTreeSet::new(),
            positions: BTreeMap::new(),
        })
    }

    fn wants(&self, symbol: &str) -> bool {
        self.params.symbols.is_empty() || self.params.symbols.iter().any(|s| s == symbol)
    }

    async fn mirror(&self, order: &OpenOrder, ctx: &StrategyContext<'_>) -> Result<TradeSignal> {
        let p = &self.params;
        let reference = match order.price {
            Some(price) => price,
            None => ctx.ticker(&p.target_exchange, &order.symbol).await?.last,
        };
        let mut amount = order.amount * p.copy_ratio;
        if let Some(cap) = p.max_order_usd {
            if reference > Decimal::ZERO && amount * reference > cap {
                amount = (cap / reference).round_dp(8);
            }
        }
        let reason = format!("copy of {} on {}", order.order_id, p.source_exchange);
        Ok(match (order.order_type, order.price) {
            (OrderType::Limit, Some(price)) => TradeSignal::limit(
                &p.target_exchange,
                &order.symbol,
                order.side,
                amount,
                price,
                reason,
            ),
            _ => TradeSignal::market(&p.target_exchange, &order.symbol, order.side, amount, reason),
        })
    }
}

#[async_trait]
impl Strategy for CopyTradingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CopyTrading
    }

    async fn on_start(&mut self, ctx: &StrategyContext<'_>) -> Result<Activation> {
        if self.params.source_exchange == self.params.target_exchange {
            return Ok(Activation::Inactive(
                "source and target exchange are the same".to_string(),
            ));
        }
        // Orders already resting at start are history, not new activity.
        let existing = ctx.open_orders(&self.params.source_exchange, None).await?;
        self.seen = existing.into_iter().map(|o| o.order_id).collect();
        info!(
            source = %self.params.source_exchange,
            target = %self.params.target_exchange,
            existing = self.seen.len(),
            "Copy trading starting"
        );
        Ok(Activation::Active)
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let orders = ctx.open_orders(&self.params.source_exchange, None).await?;
        let mut signals = Vec::new();
        for order in &orders {
            if self.seen.contains(&order.order_id) {
                continue;
            }
            if !self.wants(&order.symbol) {
                debug!(symbol = %order.symbol, "Skipping unfollowed symbol");
                continue;
            }
            signals.push(self.mirror(order, ctx).await?);
        }
        self.seen = orders.into_iter().map(|o| o.order_id).collect();
        Ok(signals)
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        let position = self.positions.entry(fill.symbol.clone()).or_default();
        Ok(FillEffect::realized(position.apply_fill(fill)))
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use autotrader_core::events::OrderSide;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn copier(max_order_usd: Option<Decimal>) -> CopyTradingStrategy {
        CopyTradingStrategy::new(CopyTradingParams {
            source_exchange: "leader".to_string(),
            target_exchange: "binance".to_string(),
            symbols: vec!["BTC/USDT".to_string()],
            copy_ratio: dec!(0.5),
            max_order_usd,
        })
        .unwrap()
    }

    fn order(id: &str, symbol: &str, amount: Decimal, price: Decimal) -> OpenOrder {
        OpenOrder {
            order_id: id.to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            amount,
            price: Some(price),
            order_type: OrderType::Limit,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_same_exchange_deactivates() {
        let h = Harness::new(&["binance"]);
        let mut c = CopyTradingStrategy::new(CopyTradingParams {
            source_exchange: "binance".to_string(),
            target_exchange: "binance".to_string(),
            symbols: Vec::new(),
            copy_ratio: Decimal::ONE,
            max_order_usd: None,
        })
        .unwrap();
        assert!(matches!(
            c.on_start(&h.ctx()).await.unwrap(),
            Activation::Inactive(_)
        ));
    }

    #[tokio::test]
    async fn test_copies_only_new_orders_scaled() {
        let h = Harness::new(&["leader", "binance"]);
        h.exchange
            .add_open_order("leader", order("old", "BTC/USDT", dec!(1), dec!(100)));

        let mut c = copier(None);
        c.on_start(&h.ctx()).await.unwrap();
        assert!(c.evaluate(&h.ctx()).await.unwrap().is_empty());

        h.exchange
            .add_open_order("leader", order("new", "BTC/USDT", dec!(2), dec!(100)));
        h.exchange
            .add_open_order("leader", order("alt", "DOGE/USDT", dec!(50), dec!(1)));
        let signals = c.evaluate(&h.ctx()).await.unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].exchange, "binance");
        assert_eq!(signals[0].amount, dec!(1));
        assert_eq!(signals[0].price, Some(dec!(100)));

        assert!(c.evaluate(&h.ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caps_order_value() {
        let h = Harness::new(&["leader", "binance"]);
        let mut c = copier(Some(dec!(50)));
        c.on_start(&h.ctx()).await.unwrap();

        h.exchange
            .add_open_order("leader", order("big", "BTC/USDT", dec!(4), dec!(100)));
        let signals = c.evaluate(&h.ctx()).await.unwrap();
        assert_eq!(signals[0].amount, dec!(0.5));
    }
}
