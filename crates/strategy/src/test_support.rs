use crate::context::StrategyContext;
use autotrader_core::config::RiskConfig;
use autotrader_core::events::{OrderFill, OrderSide};
use autotrader_core::market::Candle;
use autotrader_core::paper::PaperExchange;
use autotrader_risk::RiskManager;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    _dir: TempDir,
    pub exchange: PaperExchange,
    pub risk: RiskManager,
}

impl Harness {
    pub fn new(exchanges: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let risk = RiskManager::new(RiskConfig::default(), dir.path().join("risk_state.json"));
        Self {
            _dir: dir,
            exchange: PaperExchange::new(exchanges.iter().copied()),
            risk,
        }
    }

    pub fn ctx(&self) -> StrategyContext<'_> {
        StrategyContext {
            exchange: &self.exchange,
            risk: &self.risk,
            now: Utc::now(),
            call_timeout: Duration::from_secs(5),
        }
    }
}

pub fn fill(symbol: &str, side: OrderSide, amount: Decimal, price: Decimal) -> OrderFill {
    OrderFill {
        order_id: "test-fill".to_string(),
        exchange: "binance".to_string(),
        symbol: symbol.to_string(),
        side,
        amount,
        price,
        fee: Decimal::ZERO,
        timestamp: Utc::now(),
    }
}

/// Flat candles, one per close, oldest first.
pub fn candles(closes: &[i64]) -> Vec<Candle> {
    let start = Utc::now() - ChronoDuration::hours(closes.len() as i64);
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let price = Decimal::from(*close);
            Candle {
                timestamp: start + ChronoDuration::hours(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: Decimal::ONE,
            }
        })
        .collect()
}
