use crate::arbitrage::ArbitrageStrategy;
use crate::copy_trading::CopyTradingStrategy;
use crate::dca::DcaStrategy;
use crate::grid::GridStrategy;
use crate::rebalancing::RebalancingStrategy;
use crate::scalping::ScalpingStrategy;
use crate::swing::SwingStrategy;
use crate::traits::{parse_params, Strategy};
use crate::trend::TrendFollowingStrategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Closed set of strategy variants known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Grid,
    Dca,
    TrendFollowing,
    Swing,
    Scalping,
    Arbitrage,
    Rebalancing,
    CopyTrading,
}

impl StrategyKind {
    pub const ALL: [Self; 8] = [
        Self::Grid,
        Self::Dca,
        Self::TrendFollowing,
        Self::Swing,
        Self::Scalping,
        Self::Arbitrage,
        Self::Rebalancing,
        Self::CopyTrading,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Dca => "dca",
            Self::TrendFollowing => "trend_following",
            Self::Swing => "swing",
            Self::Scalping => "scalping",
            Self::Arbitrage => "arbitrage",
            Self::Rebalancing => "rebalancing",
            Self::CopyTrading => "copy_trading",
        }
    }

    /// Builds a fresh instance from merged parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters do not deserialize or fail validation.
    pub fn create(self, params: Value) -> Result<Box<dyn Strategy>> {
        Ok(match self {
            Self::Grid => Box::new(GridStrategy::new(parse_params(params)?)?),
            Self::Dca => Box::new(DcaStrategy::new(parse_params(params)?)?),
            Self::TrendFollowing => Box::new(TrendFollowingStrategy::new(parse_params(params)?)?),
            Self::Swing => Box::new(SwingStrategy::new(parse_params(params)?)?),
            Self::Scalping => Box::new(ScalpingStrategy::new(parse_params(params)?)?),
            Self::Arbitrage => Box::new(ArbitrageStrategy::new(parse_params(params)?)?),
            Self::Rebalancing => Box::new(RebalancingStrategy::new(parse_params(params)?)?),
            Self::CopyTrading => Box::new(CopyTradingStrategy::new(parse_params(params)?)?),
        })
    }

    /// Rebuilds an instance from the value its `to_value` produced.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state does not match this variant.
    pub fn restore(self, state: Value) -> Result<Box<dyn Strategy>> {
        Ok(match self {
            Self::Grid => Box::new(serde_json::from_value::<GridStrategy>(state)?),
            Self::Dca => Box::new(serde_json::from_value::<DcaStrategy>(state)?),
            Self::TrendFollowing => {
                Box::new(serde_json::from_value::<TrendFollowingStrategy>(state)?)
            }
            Self::Swing => Box::new(serde_json::from_value::<SwingStrategy>(state)?),
            Self::Scalping => Box::new(serde_json::from_value::<ScalpingStrategy>(state)?),
            Self::Arbitrage => Box::new(serde_json::from_value::<ArbitrageStrategy>(state)?),
            Self::Rebalancing => Box::new(serde_json::from_value::<RebalancingStrategy>(state)?),
            Self::CopyTrading => Box::new(serde_json::from_value::<CopyTradingStrategy>(state)?),
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown strategy '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("martingale".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_create_rejects_missing_required_params() {
        let err = StrategyKind::Grid.create(json!({ "exchange": "binance" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_restore_rebuilds_same_kind() {
        let grid = StrategyKind::Grid
            .create(json!({
                "exchange": "binance",
                "symbol": "BTC/USDT",
                "price_range": ["90000", "110000"],
                "amount_per_grid": "0.001"
            }))
            .unwrap();
        let restored = StrategyKind::Grid.restore(grid.to_value().unwrap()).unwrap();
        assert_eq!(restored.kind(), StrategyKind::Grid);
    }
}
