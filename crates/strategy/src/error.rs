use autotrader_core::persistence::PersistenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("strategy '{0}' is disabled in configuration")]
    StrategyDisabled(String),

    #[error("invalid parameters for '{name}': {message}")]
    InvalidParams { name: String, message: String },

    #[error("no strategy instance with id '{0}'")]
    NotFound(String),

    #[error("strategy state persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}
