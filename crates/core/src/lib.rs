pub mod clock;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod market;
pub mod paper;
pub mod persistence;
pub mod position;
pub mod traits;

pub use clock::{saturating_secs, Clock, ManualClock, SystemClock};
pub use config::{
    AlertPriority, AlertRuleConfig, AppConfig, ChannelKind, DaemonConfig, NotificationConfig,
    RiskConfig, RiskOverrides, StrategyConfig,
};
pub use config_loader::ConfigLoader;
pub use error::ExchangeError;
pub use events::{OrderFill, OrderSide, OrderStatus, OrderType, PlacedOrder, TradeSignal};
pub use market::{Balance, Candle, OpenOrder, OrderBook, Sentiment, Ticker};
pub use paper::PaperExchange;
pub use persistence::{JsonStore, PersistenceError};
pub use position::Position;
pub use traits::{bounded, ExchangeManager, SentimentAnalyzer};
