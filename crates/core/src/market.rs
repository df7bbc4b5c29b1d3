//! Market data shapes returned by exchange collaborators.

use crate::events::{OrderSide, OrderType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Bid/ask spread as a percentage of the mid price.
    #[must_use]
    pub fn spread_pct(&self) -> Decimal {
        let mid = self.mid();
        if mid.is_zero() {
            return Decimal::ZERO;
        }
        (self.ask - self.bid) / mid * Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

/// Order book snapshot. Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Summed amount over the top `levels` bids.
    #[must_use]
    pub fn bid_depth(&self, levels: usize) -> Decimal {
        self.bids.iter().take(levels).map(|l| l.amount).sum()
    }

    /// Summed amount over the top `levels` asks.
    #[must_use]
    pub fn ask_depth(&self, levels: usize) -> Decimal {
        self.asks.iter().take(levels).map(|l| l.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub assets: BTreeMap<String, AssetBalance>,
}

impl Balance {
    /// Total holding of `asset`, zero when absent.
    #[must_use]
    pub fn total(&self, asset: &str) -> Decimal {
        self.assets.get(asset).map_or(Decimal::ZERO, |b| b.total)
    }

    #[must_use]
    pub fn free(&self, asset: &str) -> Decimal {
        self.assets.get(asset).map_or(Decimal::ZERO, |b| b.free)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub order_type: OrderType,
    pub created_at: DateTime<Utc>,
}

/// Quick sentiment reading for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// Normalized score in `[-1.0, 1.0]`.
    pub score: f64,
    pub label: String,
}

/// Splits `BASE/QUOTE` into its two assets.
#[must_use]
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once('/')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker(bid: Decimal, ask: Decimal) -> Ticker {
        Ticker {
            symbol: "BTC/USDT".to_string(),
            bid,
            ask,
            last: bid,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_spread_pct() {
        let t = ticker(dec!(99), dec!(101));
        assert_eq!(t.mid(), dec!(100));
        assert_eq!(t.spread_pct(), dec!(2));
    }

    #[test]
    fn test_depth_sums_top_levels() {
        let book = OrderBook {
            symbol: "BTC/USDT".to_string(),
            bids: vec![
                BookLevel { price: dec!(100), amount: dec!(2) },
                BookLevel { price: dec!(99), amount: dec!(3) },
                BookLevel { price: dec!(98), amount: dec!(10) },
            ],
            asks: vec![BookLevel { price: dec!(101), amount: dec!(1) }],
        };
        assert_eq!(book.bid_depth(2), dec!(5));
        assert_eq!(book.ask_depth(5), dec!(1));
        assert_eq!(book.best_bid(), Some(dec!(100)));
    }

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("ETH/USDT"), Some(("ETH", "USDT")));
        assert_eq!(split_symbol("ETHUSDT"), None);
        assert_eq!(split_symbol("/USDT"), None);
    }
}
