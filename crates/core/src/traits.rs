use crate::error::ExchangeError;
use crate::events::{OrderSide, OrderType, PlacedOrder};
use crate::market::{Balance, Candle, OpenOrder, OrderBook, Sentiment, Ticker};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;

/// Multi-exchange connectivity consumed by strategies and the daemon.
///
/// Every method may fail for one exchange without affecting the others.
#[async_trait]
pub trait ExchangeManager: Send + Sync {
    fn available_exchanges(&self) -> Vec<String>;

    async fn get_balance(&self, exchange: &str) -> Result<Balance, ExchangeError>;

    async fn get_ticker(&self, exchange: &str, symbol: &str) -> Result<Ticker, ExchangeError>;

    async fn get_orderbook(
        &self,
        exchange: &str,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError>;

    async fn get_ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn get_open_orders(
        &self,
        exchange: &str,
        symbol: Option<&str>,
    ) -> Result<Vec<OpenOrder>, ExchangeError>;

    async fn place_order(
        &self,
        exchange: &str,
        symbol: &str,
        side: OrderSide,
        amount: Decimal,
        price: Option<Decimal>,
        order_type: OrderType,
    ) -> Result<PlacedOrder, ExchangeError>;

    /// Cancels every open order on `exchange`, returning how many were cancelled.
    async fn cancel_all_orders(&self, exchange: &str) -> Result<usize, ExchangeError>;
}

#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn get_quick_sentiment(&self, symbol: &str) -> Result<Sentiment>;
}

/// Runs an exchange call under a deadline.
///
/// # Errors
///
/// Returns the call's own error, or `ExchangeError::Timeout` when `limit` elapses first.
pub async fn bounded<T, F>(exchange: &str, limit: Duration, call: F) -> Result<T, ExchangeError>
where
    F: Future<Output = Result<T, ExchangeError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| {
            Err(ExchangeError::Timeout {
                exchange: exchange.to_string(),
                secs: limit.as_secs(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let value = bounded("binance", Duration::from_secs(1), async { Ok::<_, ExchangeError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), ExchangeError> = bounded("slowex", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(ExchangeError::Timeout { ref exchange, .. }) if exchange == "slowex"
        ));
    }
}
