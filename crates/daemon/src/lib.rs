//! Background monitor for the autotrader.
//!
//! One cooperative loop drives open-order tracking, portfolio valuation,
//! risk-limit warnings, strategy evaluation and sentiment checks at their own
//! intervals.

pub mod daemon;
pub mod error;
pub mod pid;
pub mod schedule;
pub mod state;

pub use daemon::{DaemonStatus, MonitorDaemon, StartOutcome};
pub use error::DaemonError;
pub use pid::PidFile;
pub use schedule::{Schedule, Task};
pub use state::{DaemonState, TaskFailure};
