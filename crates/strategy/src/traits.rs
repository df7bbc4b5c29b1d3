use crate::context::StrategyContext;
use crate::kind::StrategyKind;
use anyhow::Result;
use async_trait::async_trait;
use autotrader_core::events::{OrderFill, TradeSignal};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Whether a strategy accepted its preconditions in `on_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Active,
    /// Registered but never evaluated.
    Inactive(String),
}

/// Result of feeding a fill into a strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillEffect {
    pub realized_pnl: Decimal,
    pub follow_up: Option<TradeSignal>,
}

impl FillEffect {
    #[must_use]
    pub fn realized(pnl: Decimal) -> Self {
        Self {
            realized_pnl: pnl,
            follow_up: None,
        }
    }

    #[must_use]
    pub fn with_follow_up(mut self, signal: TradeSignal) -> Self {
        self.follow_up = Some(signal);
        self
    }
}

/// Contract shared by every strategy variant.
///
/// Strategies only propose orders. The engine tags what they return and the
/// daemon passes each signal through the risk gate before anything reaches an
/// exchange.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Checks preconditions once, before the first evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if a required exchange call fails.
    async fn on_start(&mut self, _ctx: &StrategyContext<'_>) -> Result<Activation> {
        Ok(Activation::Active)
    }

    /// Produces zero or more signals for this cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when market data cannot be obtained or is unusable.
    async fn evaluate(&mut self, ctx: &StrategyContext<'_>) -> Result<Vec<TradeSignal>>;

    /// # Errors
    ///
    /// Returns an error if cleanup fails. The instance is removed regardless.
    async fn on_stop(&mut self, _ctx: &StrategyContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Updates position bookkeeping from a confirmed fill.
    ///
    /// # Errors
    ///
    /// Returns an error if the fill is inconsistent with the strategy's state.
    fn on_order_filled(&mut self, fill: &OrderFill) -> Result<FillEffect>;

    /// Serializes parameters and internal state for the strategy state file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_value(&self) -> Result<Value>;
}

/// Deserializes a variant's typed parameters from merged JSON.
///
/// # Errors
///
/// Returns an error naming the offending field when the JSON does not match.
pub fn parse_params<P: DeserializeOwned>(params: Value) -> Result<P> {
    Ok(serde_json::from_value(params)?)
}
