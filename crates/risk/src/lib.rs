//! Pre-trade risk gate.
//!
//! [`RiskManager`] owns the global risk ledger ([`RiskState`]): the current
//! UTC day's realized P&L, the portfolio all-time high, and the kill switch.
//! Every mutation happens under one lock and is written to disk before the
//! lock is released.

pub mod error;
pub mod limits;
pub mod manager;
pub mod state;

pub use error::{RiskLimitExceeded, RiskRule};
pub use limits::RiskLimits;
pub use manager::{OrderCheck, RiskManager, RiskStatus};
pub use state::{RiskState, TradeRecord};
