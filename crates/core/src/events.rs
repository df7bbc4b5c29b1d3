use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => f.write_str("market"),
            Self::Limit => f.write_str("limit"),
        }
    }
}

/// A proposed order produced by a strategy.
///
/// Signals are intents only. They reach an exchange after the risk gate
/// accepts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    /// Limit price; `None` for market orders.
    pub price: Option<Decimal>,
    pub order_type: OrderType,
    pub exchange: String,
    pub reason: String,
    /// Set by the strategy engine when the signal leaves a strategy.
    pub strategy_id: Option<String>,
    pub strategy_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TradeSignal {
    /// Creates an untagged market order signal.
    #[must_use]
    pub fn market(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            amount,
            price: None,
            order_type: OrderType::Market,
            exchange: exchange.into(),
            reason: reason.into(),
            strategy_id: None,
            strategy_name: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an untagged limit order signal.
    #[must_use]
    pub fn limit(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            amount,
            price: Some(price),
            order_type: OrderType::Limit,
            exchange: exchange.into(),
            reason: reason.into(),
            strategy_id: None,
            strategy_name: None,
            created_at: Utc::now(),
        }
    }

    /// Stamps the producing strategy onto the signal.
    #[must_use]
    pub fn tagged(mut self, strategy_id: &str, strategy_name: &str) -> Self {
        self.strategy_id = Some(strategy_id.to_string());
        self.strategy_name = Some(strategy_name.to_string());
        self
    }

    /// Order value in quote currency, using `reference_price` for market orders.
    #[must_use]
    pub fn notional(&self, reference_price: Decimal) -> Decimal {
        self.amount * self.price.unwrap_or(reference_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

/// Exchange acknowledgement of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub filled_price: Option<Decimal>,
    pub filled_amount: Decimal,
}

impl PlacedOrder {
    /// Converts a filled acknowledgement into a fill record.
    #[must_use]
    pub fn to_fill(&self, timestamp: DateTime<Utc>) -> Option<OrderFill> {
        if self.status != OrderStatus::Filled {
            return None;
        }
        let price = self.filled_price.or(self.price)?;
        Some(OrderFill {
            order_id: self.order_id.clone(),
            exchange: self.exchange.clone(),
            symbol: self.symbol.clone(),
            side: self.side,
            amount: self.filled_amount,
            price,
            fee: Decimal::ZERO,
            timestamp,
        })
    }
}

/// A confirmed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl OrderFill {
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount * self.price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opposite_side() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_signal_notional_uses_reference_for_market() {
        let market = TradeSignal::market("binance", "BTC/USDT", OrderSide::Buy, dec!(0.5), "dca");
        assert_eq!(market.notional(dec!(100)), dec!(50));

        let limit = TradeSignal::limit(
            "binance",
            "BTC/USDT",
            OrderSide::Buy,
            dec!(0.5),
            dec!(80),
            "grid",
        );
        assert_eq!(limit.notional(dec!(100)), dec!(40));
    }

    #[test]
    fn test_tagging_sets_both_fields() {
        let signal = TradeSignal::market("kraken", "ETH/USDT", OrderSide::Sell, dec!(1), "exit")
            .tagged("grid-1a2b3c4d", "grid");
        assert_eq!(signal.strategy_id.as_deref(), Some("grid-1a2b3c4d"));
        assert_eq!(signal.strategy_name.as_deref(), Some("grid"));
    }

    #[test]
    fn test_open_order_has_no_fill() {
        let placed = PlacedOrder {
            order_id: "1".to_string(),
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            amount: dec!(1),
            price: Some(dec!(100)),
            order_type: OrderType::Limit,
            status: OrderStatus::Open,
            filled_price: None,
            filled_amount: Decimal::ZERO,
        };
        assert!(placed.to_fill(Utc::now()).is_none());
    }

    #[test]
    fn test_side_serializes_lowercase() {
        let json = serde_json::to_string(&OrderSide::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
    }
}
