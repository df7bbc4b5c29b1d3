use autotrader_core::clock::saturating_secs;
use autotrader_core::config::DaemonConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

/// Periodic jobs run by the monitor loop, in per-pass execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    OpenOrders,
    Portfolio,
    RiskCheck,
    Strategies,
    Sentiment,
}

impl Task {
    pub const ALL: [Self; 5] = [
        Self::OpenOrders,
        Self::Portfolio,
        Self::RiskCheck,
        Self::Strategies,
        Self::Sentiment,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenOrders => "open_orders",
            Self::Portfolio => "portfolio",
            Self::RiskCheck => "risk_check",
            Self::Strategies => "strategies",
            Self::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elapsed-time bookkeeping for the fixed task intervals.
#[derive(Debug, Clone)]
pub struct Schedule {
    intervals: HashMap<Task, Duration>,
    last_run: HashMap<Task, DateTime<Utc>>,
}

impl Schedule {
    #[must_use]
    pub fn from_config(config: &DaemonConfig) -> Self {
        let intervals = HashMap::from([
            (Task::OpenOrders, saturating_secs(config.open_orders_secs)),
            (Task::Portfolio, saturating_secs(config.portfolio_secs)),
            (Task::RiskCheck, saturating_secs(config.risk_check_secs)),
            (Task::Strategies, saturating_secs(config.strategy_secs)),
            (Task::Sentiment, saturating_secs(config.sentiment_secs)),
        ]);
        Self {
            intervals,
            last_run: HashMap::new(),
        }
    }

    /// Tasks whose interval has elapsed at `now`. Tasks that never ran are due.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Task> {
        Task::ALL
            .into_iter()
            .filter(|task| match self.last_run.get(task) {
                None => true,
                Some(last) => now - *last >= self.interval(*task),
            })
            .collect()
    }

    pub fn mark(&mut self, task: Task, now: DateTime<Utc>) {
        self.last_run.insert(task, now);
    }

    #[must_use]
    pub fn interval(&self, task: Task) -> Duration {
        self.intervals.get(&task).copied().unwrap_or_else(Duration::zero)
    }
}
