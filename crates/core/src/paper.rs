//! In-memory exchange backend.
//!
//! `PaperExchange` implements [`ExchangeManager`] over hand-set market data so
//! strategies, the risk gate and the daemon can run without a venue. Market
//! orders fill immediately at the touch; limit orders rest until
//! [`PaperExchange::fill_open_order`] is called.

use crate::error::ExchangeError;
use crate::events::{OrderSide, OrderStatus, OrderType, PlacedOrder};
use crate::market::{
    split_symbol, AssetBalance, Balance, BookLevel, Candle, OpenOrder, OrderBook, Ticker,
};
use crate::traits::ExchangeManager;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Venue {
    tickers: HashMap<String, Ticker>,
    books: HashMap<String, OrderBook>,
    candles: HashMap<(String, String), Vec<Candle>>,
    balance: Balance,
    open_orders: Vec<OpenOrder>,
    placed: Vec<PlacedOrder>,
    failing: bool,
}

#[derive(Debug, Default)]
pub struct PaperExchange {
    venues: Mutex<BTreeMap<String, Venue>>,
    next_id: AtomicU64,
}

impl PaperExchange {
    #[must_use]
    pub fn new<I, S>(exchanges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let venues = exchanges
            .into_iter()
            .map(|name| (name.into(), Venue::default()))
            .collect();
        Self {
            venues: Mutex::new(venues),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_ticker(&self, exchange: &str, symbol: &str, bid: Decimal, ask: Decimal) {
        let ticker = Ticker {
            symbol: symbol.to_string(),
            bid,
            ask,
            last: (bid + ask) / Decimal::TWO,
            timestamp: Utc::now(),
        };
        self.with_venue(exchange, |v| {
            v.tickers.insert(symbol.to_string(), ticker);
        });
    }

    pub fn set_orderbook(&self, exchange: &str, book: OrderBook) {
        self.with_venue(exchange, |v| {
            v.books.insert(book.symbol.clone(), book);
        });
    }

    pub fn set_candles(&self, exchange: &str, symbol: &str, timeframe: &str, candles: Vec<Candle>) {
        self.with_venue(exchange, |v| {
            v.candles
                .insert((symbol.to_string(), timeframe.to_string()), candles);
        });
    }

    pub fn set_balance(&self, exchange: &str, asset: &str, total: Decimal) {
        self.with_venue(exchange, |v| {
            v.balance.assets.insert(
                asset.to_string(),
                AssetBalance {
                    free: total,
                    used: Decimal::ZERO,
                    total,
                },
            );
        });
    }

    pub fn add_open_order(&self, exchange: &str, order: OpenOrder) {
        self.with_venue(exchange, |v| v.open_orders.push(order));
    }

    /// Removes a resting order as if it had executed, returning it.
    pub fn fill_open_order(&self, exchange: &str, order_id: &str) -> Option<OpenOrder> {
        let mut venues = self.venues.lock();
        let venue = venues.get_mut(exchange)?;
        let idx = venue
            .open_orders
            .iter()
            .position(|o| o.order_id == order_id)?;
        Some(venue.open_orders.remove(idx))
    }

    /// Makes every call against `exchange` fail until reset.
    pub fn set_failing(&self, exchange: &str, failing: bool) {
        self.with_venue(exchange, |v| v.failing = failing);
    }

    /// Orders accepted on `exchange`, in submission order.
    #[must_use]
    pub fn placed_orders(&self, exchange: &str) -> Vec<PlacedOrder> {
        self.venues
            .lock()
            .get(exchange)
            .map(|v| v.placed.clone())
            .unwrap_or_default()
    }

    fn with_venue(&self, exchange: &str, f: impl FnOnce(&mut Venue)) {
        let mut venues = self.venues.lock();
        f(venues.entry(exchange.to_string()).or_default());
    }

    fn access<T>(
        &self,
        exchange: &str,
        f: impl FnOnce(&mut Venue) -> Result<T, ExchangeError>,
    ) -> Result<T, ExchangeError> {
        let mut venues = self.venues.lock();
        let venue = venues
            .get_mut(exchange)
            .ok_or_else(|| ExchangeError::Unavailable(exchange.to_string()))?;
        if venue.failing {
            return Err(ExchangeError::request(exchange, "simulated outage"));
        }
        f(venue)
    }
}

fn unknown(exchange: &str, symbol: &str) -> ExchangeError {
    ExchangeError::UnknownSymbol {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
    }
}

#[async_trait]
impl ExchangeManager for PaperExchange {
    fn available_exchanges(&self) -> Vec<String> {
        self.venues.lock().keys().cloned().collect()
    }

    async fn get_balance(&self, exchange: &str) -> Result<Balance, ExchangeError> {
        self.access(exchange, |v| Ok(v.balance.clone()))
    }

    async fn get_ticker(&self, exchange: &str, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.access(exchange, |v| {
            v.tickers
                .get(symbol)
                .cloned()
                .ok_or_else(|| unknown(exchange, symbol))
        })
    }

    async fn get_orderbook(
        &self,
        exchange: &str,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError> {
        self.access(exchange, |v| {
            if let Some(book) = v.books.get(symbol) {
                let mut book = book.clone();
                book.bids.truncate(depth);
                book.asks.truncate(depth);
                return Ok(book);
            }
            let ticker = v.tickers.get(symbol).ok_or_else(|| unknown(exchange, symbol))?;
            Ok(OrderBook {
                symbol: symbol.to_string(),
                bids: vec![BookLevel {
                    price: ticker.bid,
                    amount: Decimal::ONE,
                }],
                asks: vec![BookLevel {
                    price: ticker.ask,
                    amount: Decimal::ONE,
                }],
            })
        })
    }

    async fn get_ohlcv(
        &self,
        exchange: &str,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.access(exchange, |v| {
            let candles = v
                .candles
                .get(&(symbol.to_string(), timeframe.to_string()))
                .ok_or_else(|| unknown(exchange, symbol))?;
            let skip = candles.len().saturating_sub(limit);
            Ok(candles[skip..].to_vec())
        })
    }

    async fn get_open_orders(
        &self,
        exchange: &str,
        symbol: Option<&str>,
    ) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.access(exchange, |v| {
            Ok(v.open_orders
                .iter()
                .filter(|o| symbol.map_or(true, |s| o.symbol == s))
                .cloned()
                .collect())
        })
    }

    async fn place_order(
        &self,
        exchange: &str,
        symbol: &str,
        side: OrderSide,
        amount: Decimal,
        price: Option<Decimal>,
        order_type: OrderType,
    ) -> Result<PlacedOrder, ExchangeError> {
        if split_symbol(symbol).is_none() {
            return Err(ExchangeError::request(
                exchange,
                format!("malformed symbol {symbol}, expected BASE/QUOTE"),
            ));
        }
        let order_id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.access(exchange, |v| {
            let placed = match order_type {
                OrderType::Market => {
                    let ticker = v.tickers.get(symbol).ok_or_else(|| unknown(exchange, symbol))?;
                    let fill_price = match side {
                        OrderSide::Buy => ticker.ask,
                        OrderSide::Sell => ticker.bid,
                    };
                    PlacedOrder {
                        order_id,
                        exchange: exchange.to_string(),
                        symbol: symbol.to_string(),
                        side,
                        amount,
                        price,
                        order_type,
                        status: OrderStatus::Filled,
                        filled_price: Some(fill_price),
                        filled_amount: amount,
                    }
                }
                OrderType::Limit => {
                    let limit = price.ok_or_else(|| {
                        ExchangeError::request(exchange, "limit order requires a price")
                    })?;
                    v.open_orders.push(OpenOrder {
                        order_id: order_id.clone(),
                        symbol: symbol.to_string(),
                        side,
                        amount,
                        price: Some(limit),
                        order_type,
                        created_at: Utc::now(),
                    });
                    PlacedOrder {
                        order_id,
                        exchange: exchange.to_string(),
                        symbol: symbol.to_string(),
                        side,
                        amount,
                        price,
                        order_type,
                        status: OrderStatus::Open,
                        filled_price: None,
                        filled_amount: Decimal::ZERO,
                    }
                }
            };
            v.placed.push(placed.clone());
            Ok(placed)
        })
    }

    async fn cancel_all_orders(&self, exchange: &str) -> Result<usize, ExchangeError> {
        self.access(exchange, |v| {
            let cancelled = v.open_orders.len();
            v.open_orders.clear();
            Ok(cancelled)
        })
    }
}
