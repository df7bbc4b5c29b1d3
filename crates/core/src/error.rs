use thiserror::Error;

/// Failure of a single exchange call.
///
/// Callers sweeping several exchanges log the error and move on to the next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("exchange {0} is not available")]
    Unavailable(String),

    #[error("{exchange}: request failed: {message}")]
    Request { exchange: String, message: String },

    #[error("{exchange}: call timed out after {secs}s")]
    Timeout { exchange: String, secs: u64 },

    #[error("{exchange}: unknown symbol {symbol}")]
    UnknownSymbol { exchange: String, symbol: String },

    #[error("{exchange}: insufficient balance for {symbol}")]
    InsufficientBalance { exchange: String, symbol: String },
}

impl ExchangeError {
    #[must_use]
    pub fn request(exchange: &str, message: impl Into<String>) -> Self {
        Self::Request {
            exchange: exchange.to_string(),
            message: message.into(),
        }
    }
}
