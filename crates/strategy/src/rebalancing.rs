//! Periodic portfolio rebalancing toward target weights.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{Activation, FillEffect, Strategy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrader_core::clock::saturating_secs;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

fn default_quote() -> String {
    "USDT".to_string()
}
fn default_threshold_pct() -> Decimal {
    Decimal::from(5)
}
const fn default_interval_secs() -> u64 {
    86_400
}
fn default_min_trade_usd() -> Decimal {
    Decimal::from(10)
}

/// Allowed distance of the weight sum from 100.
fn allocation_tolerance() -> Decimal {
    Decimal::new(5, 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancingParams {
    pub exchange: String,
    #[serde(default = "default_quote")]
    pub quote: String,
    /// Asset -> target weight in percent. May include the quote asset.
    pub target_allocations: BTreeMap<String, Decimal>,
    /// Drift, in percentage points, that triggers a trade.
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: Decimal,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_min_trade_usd")]
    pub min_trade_usd: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalancingStrategy {
    params: RebalancingParams,
    #[serde(default)]
    last_rebalance_at: Option<DateTime<Utc>>,
}

impl RebalancingStrategy {
    /// # Errors
    ///
    /// Returns an error if there are no targets or a weight is negative.
    pub fn new(params: RebalancingParams) -> Result<Self> {
        if params.target_allocations.is_empty() {
            bail!("target_allocations must not be empty");
        }
        if params.target_allocations.values().any(|w| *w < Decimal::ZERO) {
            bail!("target weights must not be negative");
        }
        Ok(Self {
            params,
            last_rebalance_at: None,
        })
    }

    fn allocation_sum(&self) -> Decimal {
        self.params.target_allocations.values().copied().sum()
    }

    fn symbol(&self, asset: &str) -> String {
        format!("{asset}/{}", self.params.quote)
    }
}

#[async_trait]
impl Strategy for RebalancingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rebalancing
    }

    async fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Result<Activation> {
        let sum = self.allocation_sum();
        if (sum - Decimal::ONE_HUNDRED).abs() > allocation_tolerance() {
            return Ok(Activation::Inactive(format!(
                "target allocations sum to {sum}%, expected 100%"
            )));
        }
        Ok(Activation::Active)
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let p = &self.params;
        if let Some(last) = self.last_rebalance_at {
            if ctx.now - last < saturating_secs(p.interval_secs) {
                return Ok(Vec::new());
            }
        }

        let balance = ctx.balance(&p.exchange).await?;
        let mut holdings = Vec::with_capacity(p.target_allocations.len());
        for (asset, target) in &p.target_allocations {
            let price = if *asset == p.quote {
                Decimal::ONE
            } else {
                ctx.ticker(&p.exchange, &self.symbol(asset)).await?.last
            };
            holdings.push((asset.as_str(), *target, price, balance.total(asset) * price));
        }

        let total: Decimal = holdings.iter().map(|(_, _, _, value)| *value).sum();
        self.last_rebalance_at = Some(ctx.now);
        if total <= Decimal::ZERO {
            warn!(exchange = %p.exchange, "Nothing to rebalance, portfolio is empty");
            return Ok(Vec::new());
        }

        let mut sells = Vec::new();
        let mut buys = Vec::new();
        for (asset, target, price, value) in holdings {
            if asset == p.quote || price <= Decimal::ZERO {
                continue;
            }
            let drift = value / total * Decimal::ONE_HUNDRED - target;
            if drift.abs() <= p.threshold_pct {
                continue;
            }
            let trade_usd = drift.abs() / Decimal::ONE_HUNDRED * total;
            if trade_usd < p.min_trade_usd {
                continue;
            }
            let side = if drift > Decimal::ZERO {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            let signal = TradeSignal::market(
                &p.exchange,
                self.symbol(asset),
                side,
                (trade_usd / price).round_dp(8),
                format!("rebalance {asset}: drift {}pp", drift.round_dp(2)),
            );
            match side {
                OrderSide::Sell => sells.push(signal),
                OrderSide::Buy => buys.push(signal),
            }
        }

        if !sells.is_empty() || !buys.is_empty() {
            info!(
                exchange = %p.exchange,
                sells = sells.len(),
                buys = buys.len(),
                total = %total.round_dp(2),
                "Rebalancing portfolio"
            );
        }
        sells.extend(buys);
        Ok(sells)
    }

    fn on_order_filled(&mut self, _fill: &OrderFill) -> Result<FillEffect> {
        Ok(FillEffect::default())
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
