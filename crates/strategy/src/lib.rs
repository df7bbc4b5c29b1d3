//! Strategy contract, the eight strategy variants and the engine that runs them.

pub mod arbitrage;
pub mod context;
pub mod copy_trading;
pub mod dca;
pub mod engine;
pub mod error;
pub mod grid;
pub mod indicators;
pub mod kind;
pub mod rebalancing;
pub mod scalping;
pub mod swing;
pub mod traits;
pub mod trend;

#[cfg(test)]
mod test_support;

pub use context::StrategyContext;
pub use engine::{FillOutcome, StrategyEngine, StrategyInfo, StrategyStats};
pub use error::EngineError;
pub use kind::StrategyKind;
pub use traits::{Activation, FillEffect, Strategy};
