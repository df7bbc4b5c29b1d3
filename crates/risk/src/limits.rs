use autotrader_core::config::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Hard limits effective for one strategy after overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_order_size_usd: Decimal,
    pub max_open_orders: usize,
    pub max_position_size_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
}

impl RiskLimits {
    /// Global limits.
    #[must_use]
    pub fn global(config: &RiskConfig) -> Self {
        Self {
            max_order_size_usd: config.max_order_size_usd,
            max_open_orders: config.max_open_orders,
            max_position_size_pct: config.max_position_size_pct,
            max_daily_loss_pct: config.max_daily_loss_pct,
            max_drawdown_pct: config.max_drawdown_pct,
        }
    }

    /// Limits for `strategy`, each field taken from its override when set.
    #[must_use]
    pub fn resolve(config: &RiskConfig, strategy: Option<&str>) -> Self {
        let global = Self::global(config);
        let Some(overrides) = strategy.and_then(|s| config.strategy_overrides.get(s)) else {
            return global;
        };

        Self {
            max_order_size_usd: overrides
                .max_order_size_usd
                .unwrap_or(global.max_order_size_usd),
            max_open_orders: overrides.max_open_orders.unwrap_or(global.max_open_orders),
            max_position_size_pct: overrides
                .max_position_size_pct
                .unwrap_or(global.max_position_size_pct),
            max_daily_loss_pct: overrides
                .max_daily_loss_pct
                .unwrap_or(global.max_daily_loss_pct),
            max_drawdown_pct: overrides.max_drawdown_pct.unwrap_or(global.max_drawdown_pct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrader_core::config::RiskOverrides;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unknown_strategy_uses_global() {
        let config = RiskConfig::default();
        assert_eq!(
            RiskLimits::resolve(&config, Some("dca")),
            RiskLimits::global(&config)
        );
        assert_eq!(RiskLimits::resolve(&config, None), RiskLimits::global(&config));
    }

    #[test]
    fn test_override_replaces_only_set_fields() {
        let mut config = RiskConfig::default();
        config.strategy_overrides.insert(
            "grid".to_string(),
            RiskOverrides {
                max_open_orders: Some(40),
                max_order_size_usd: Some(dec!(250)),
                ..RiskOverrides::default()
            },
        );

        let limits = RiskLimits::resolve(&config, Some("grid"));
        assert_eq!(limits.max_open_orders, 40);
        assert_eq!(limits.max_order_size_usd, dec!(250));
        assert_eq!(limits.max_drawdown_pct, config.max_drawdown_pct);
    }
}
