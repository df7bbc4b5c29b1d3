//! Cross-exchange spot arbitrage.
//!
//! Every ordered exchange pair is checked in both directions. Only the best
//! pair whose spread clears fees and the configured margin is traded.

use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use crate::traits::{Activation, FillEffect, Strategy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, OrderSide, TradeSignal};
use autotrader_core::market::Ticker;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

fn default_fee_pct() -> Decimal {
    Decimal::new(1, 1)
}
fn default_min_net_spread_pct() -> Decimal {
    Decimal::new(3, 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrageParams {
    pub symbol: String,
    /// Empty means every exchange the manager reports.
    #[serde(default)]
    pub exchanges: Vec<String>,
    /// Taker fee per leg, in percent.
    #[serde(default = "default_fee_pct")]
    pub fee_pct: Decimal,
    #[serde(default = "default_min_net_spread_pct")]
    pub min_net_spread_pct: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub net_spread_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageStrategy {
    params: ArbitrageParams,
    #[serde(default)]
    exchanges: Vec<String>,
    #[serde(default)]
    last_opportunity: Option<Opportunity>,
    #[serde(default)]
    opportunities_taken: u64,
}

impl ArbitrageStrategy {
    /// # Errors
    ///
    /// Returns an error if `amount` is not positive.
    pub fn new(params: ArbitrageParams) -> Result<Self> {
        if params.amount <= Decimal::ZERO {
            bail!("amount must be positive");
        }
        Ok(Self {
            exchanges: params.exchanges.clone(),
            params,
            last_opportunity: None,
            opportunities_taken: 0,
        })
    }

    /// Net spread in percent for buying at `buy.ask` and selling at `sell.bid`.
    #[must_use]
    pub fn net_spread_pct(&self, buy: &Ticker, sell: &Ticker) -> Option<Decimal> {
        if buy.ask <= Decimal::ZERO {
            return None;
        }
        let gross = (sell.bid - buy.ask) / buy.ask * Decimal::ONE_HUNDRED;
        Some(gross - Decimal::TWO * self.params.fee_pct)
    }

    /// Best qualifying `(buy_exchange, sell_exchange, opportunity)` among `quotes`.
    #[must_use]
    pub fn best_pair<'a>(
        &self,
        quotes: &'a [(String, Ticker)],
    ) -> Option<(&'a str, &'a str, Opportunity)> {
        let mut best: Option<(&str, &str, Opportunity)> = None;
        for (buy_ex, buy) in quotes {
            for (sell_ex, sell) in quotes {
                if buy_ex == sell_ex {
                    continue;
                }
                let Some(net) = self.net_spread_pct(buy, sell) else {
                    continue;
                };
                if net <= self.params.min_net_spread_pct {
                    continue;
                }
                if best.map_or(true, |(_, _, b)| net > b.net_spread_pct) {
                    best = Some((
                        buy_ex.as_str(),
                        sell_ex.as_str(),
                        Opportunity {
                            buy_price: buy.ask,
                            sell_price: sell.bid,
                            net_spread_pct: net,
                        },
                    ));
                }
            }
        }
        best
    }
}

#[async_trait]
impl Strategy for ArbitrageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arbitrage
    }

    async fn on_start(&mut self, ctx: &StrategyContext<'_>) -> Result<Activation> {
        if self.params.exchanges.is_empty() {
            self.exchanges = ctx.exchange.available_exchanges();
        }
        if self.exchanges.len() < 2 {
            return Ok(Activation::Inactive(format!(
                "arbitrage needs at least 2 exchanges, have {}",
                self.exchanges.len()
            )));
        }
        Ok(Activation::Active)
    }

    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>> {
        let mut quotes = Vec::with_capacity(self.exchanges.len());
        for exchange in &self.exchanges {
            match ctx.ticker(exchange, &self.params.symbol).await {
                Ok(ticker) => quotes.push((exchange.clone(), ticker)),
                Err(e) => warn!(exchange = %exchange, error = %e, "Skipping exchange for arbitrage"),
            }
        }

        let Some((buy_ex, sell_ex, opp)) = self.best_pair(&quotes) else {
            return Ok(Vec::new());
        };
        info!(
            symbol = %self.params.symbol,
            buy = buy_ex,
            sell = sell_ex,
            net_spread_pct = %opp.net_spread_pct.round_dp(4),
            "Arbitrage opportunity"
        );

        let reason = format!(
            "arb {buy_ex}->{sell_ex} net {}%",
            opp.net_spread_pct.round_dp(4)
        );
        let signals = vec![
            TradeSignal::limit(
                buy_ex,
                &self.params.symbol,
                OrderSide::Buy,
                self.params.amount,
                opp.buy_price,
                reason.clone(),
            ),
            TradeSignal::limit(
                sell_ex,
                &self.params.symbol,
                OrderSide::Sell,
                self.params.amount,
                opp.sell_price,
                reason,
            ),
        ];
        self.last_opportunity = Some(opp);
        self.opportunities_taken += 1;
        Ok(signals)
    }

    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect> {
        // The sell leg realizes the captured spread against the paired buy.
        match (fill.side, self.last_opportunity) {
            (OrderSide::Sell, Some(opp)) if fill.symbol == self.params.symbol => {
                Ok(FillEffect::realized((fill.price - opp.buy_price) * fill.amount - fill.fee))
            }
            _ => Ok(FillEffect::default()),
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
