use autotrader_core::error::ExchangeError;
use autotrader_core::market::{Balance, Candle, OpenOrder, OrderBook, Ticker};
use autotrader_core::traits::{bounded, ExchangeManager};
use autotrader_risk::RiskManager;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// What a strategy may see and call during one lifecycle hook.
///
/// Every exchange helper is bounded by `call_timeout`.
pub struct StrategyContext<'a> {
    pub exchange: &'a dyn ExchangeManager,
    pub risk: &'a RiskManager,
    pub now: DateTime<Utc>,
    pub call_timeout: Duration,
}

impl StrategyContext<'_> {
    /// # Errors
    ///
    /// Returns the exchange error or a timeout.
    pub async fn ticker(&self, exchange: &str, symbol: &str) -> Result<Ticker, ExchangeError> {
        bounded(
            exchange,
            self.call_timeout,
            self.exchange.get_ticker(exchange, symbol),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns the exchange error or a timeout.
    pub async fn orderbook(
        &self,
        exchange: &str,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError> {
        bounded(
            exchange,
            self.call_timeout,
            self.exchange.get_orderbook(exchange, symbol, depth),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns the exchange error or a timeout.
    pub async fn ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        bounded(
            exchange,
            self.call_timeout,
            self.exchange.get_ohlcv(exchange, symbol, timeframe, limit),
        )
        .await
    }

    /// # Errors
    ///
    /// Returns the exchange error or a timeout.
    pub async fn balance(&self, exchange: &str) -> Result<Balance, ExchangeError> {
        bounded(exchange, self.call_timeout, self.exchange.get_balance(exchange)).await
    }

    /// # Errors
    ///
    /// Returns the exchange error or a timeout.
    pub async fn open_orders(
        &self,
        exchange: &str,
        symbol: Option<&str>,
    ) -> Result<Vec<OpenOrder>, ExchangeError> {
        bounded(
            exchange,
            self.call_timeout,
            self.exchange.get_open_orders(exchange, symbol),
        )
        .await
    }
}
