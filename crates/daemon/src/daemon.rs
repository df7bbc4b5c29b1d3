//! The monitor loop.
//!
//! [`MonitorDaemon`] is a cooperative scheduler: one pass per tick, each pass
//! running the tasks whose interval has elapsed, one after another. A task
//! runs to completion before the next one starts, so no task observes another
//! task's half-applied changes and no cross-task locking is needed.
//!
//! Liveness is advertised through a PID file. SIGTERM, SIGINT and
//! [`MonitorDaemon::stop`] all set the same flag, which is checked at the next
//! tick boundary.

use crate::error::DaemonError;
use crate::pid::{self, PidFile};
use crate::schedule::{Schedule, Task};
use crate::state::{DaemonState, TaskFailure};
use anyhow::{bail, Result};
use autotrader_core::clock::{Clock, SystemClock};
use autotrader_core::config::{AppConfig, DaemonConfig};
use autotrader_core::events::{OrderFill, TradeSignal};
use autotrader_core::persistence::JsonStore;
use autotrader_core::traits::{bounded, ExchangeManager, SentimentAnalyzer};
use autotrader_notifier::{types, Notifier};
use autotrader_risk::{OrderCheck, RiskManager, RiskRule, TradeRecord};
use autotrader_strategy::StrategyEngine;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// How a call to [`MonitorDaemon::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Another live process holds the PID file. Nothing was written.
    AlreadyRunning { pid: u32 },
    /// The loop ran and shut down cleanly.
    Stopped { passes: u64 },
}

/// Snapshot read from disk by a process other than the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    /// The PID file names a process that no longer exists.
    pub stale_pid_file: bool,
    pub state: DaemonState,
}

/// A resting order the daemon placed and watches for a fill.
#[derive(Debug, Clone)]
struct TrackedOrder {
    order_id: String,
    signal: TradeSignal,
    price: Decimal,
}

pub struct MonitorDaemon {
    config: DaemonConfig,
    exchange: Arc<dyn ExchangeManager>,
    risk: Arc<RiskManager>,
    engine: Arc<StrategyEngine>,
    notifier: Arc<Notifier>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    clock: Arc<dyn Clock>,
    pid_file: PidFile,
    store: JsonStore<DaemonState>,
    state: DaemonState,
    schedule: Schedule,
    /// Keyed by (exchange, order id).
    tracked: HashMap<(String, String), TrackedOrder>,
    open_orders: HashMap<String, usize>,
    risk_day: Option<NaiveDate>,
    /// (rule, breached) pairs already alerted on `risk_day`.
    risk_alerts: HashSet<(RiskRule, bool)>,
    stop: Arc<AtomicBool>,
    tick: Duration,
    handle_signals: bool,
}

impl MonitorDaemon {
    #[must_use]
    pub fn new(
        config: &AppConfig,
        exchange: Arc<dyn ExchangeManager>,
        risk: Arc<RiskManager>,
        engine: Arc<StrategyEngine>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config: config.daemon.clone(),
            exchange,
            risk,
            engine,
            notifier,
            sentiment: None,
            clock: Arc::new(SystemClock),
            pid_file: PidFile::new(config.pid_path()),
            store: JsonStore::new(config.daemon_state_path()),
            state: DaemonState::default(),
            schedule: Schedule::from_config(&config.daemon),
            tracked: HashMap::new(),
            open_orders: HashMap::new(),
            risk_day: None,
            risk_alerts: HashSet::new(),
            stop: Arc::new(AtomicBool::new(false)),
            tick: DEFAULT_TICK,
            handle_signals: true,
        }
    }

    #[must_use]
    pub fn with_sentiment(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Leaves process signals alone; only [`Self::stop`] ends the loop.
    #[must_use]
    pub const fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Flag that ends the loop at the next tick once set.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub const fn state(&self) -> &DaemonState {
        &self.state
    }

    /// Resting orders placed by the daemon and not yet seen filled.
    #[must_use]
    pub fn tracked_orders(&self) -> usize {
        self.tracked.len()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Runs the monitor loop until stopped.
    ///
    /// A PID file naming a live process short-circuits with
    /// [`StartOutcome::AlreadyRunning`]. A PID file naming a dead process is
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed or the PID or
    /// state file cannot be written at startup.
    pub async fn start(&mut self) -> Result<StartOutcome, DaemonError> {
        if let Some(pid) = self.pid_file.live_pid() {
            warn!(pid, path = %self.pid_file.path().display(), "Daemon already running");
            return Ok(StartOutcome::AlreadyRunning { pid });
        }
        if let Some(stale) = self.pid_file.read() {
            warn!(pid = stale, "Replacing stale PID file");
        }

        let listener = if self.handle_signals {
            Some(listen_for_signals(self.stop_handle())?)
        } else {
            None
        };

        let pid = std::process::id();
        self.pid_file.write(pid)?;
        self.state = DaemonState {
            running: true,
            pid: Some(pid),
            started_at: Some(self.clock.now()),
            ..DaemonState::default()
        };
        if let Err(e) = self.store.save(&self.state) {
            if let Err(cleanup) = self.pid_file.remove() {
                error!(error = %cleanup, "Failed to remove PID file");
            }
            if let Some(handle) = listener {
                handle.abort();
            }
            return Err(e.into());
        }

        let strategies = self.engine.active_count().await;
        info!(pid, strategies, tick_ms = self.tick.as_millis(), "Monitor daemon started");
        self.notifier
            .send_alert(
                types::DAEMON_STARTED,
                json!({ "pid": pid, "strategies": strategies }),
            )
            .await;

        let passes = self.run_loop().await;

        if let Some(handle) = listener {
            handle.abort();
        }
        self.shutdown(passes).await;
        Ok(StartOutcome::Stopped { passes })
    }

    async fn run_loop(&mut self) -> u64 {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        while !self.stop.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            self.run_pass().await;
            passes += 1;
        }
        passes
    }

    async fn shutdown(&mut self, passes: u64) {
        self.state.running = false;
        self.state.stopped_at = Some(self.clock.now());
        self.persist_state();
        if let Err(e) = self.pid_file.remove() {
            error!(error = %e, path = %self.pid_file.path().display(), "Failed to remove PID file");
        }

        info!(passes, checks = self.state.checks_performed, "Monitor daemon stopped");
        self.notifier
            .send_alert(
                types::DAEMON_STOPPED,
                json!({ "passes": passes, "checks_performed": self.state.checks_performed }),
            )
            .await;
    }

    /// Reads the PID and state files written by a running or past daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be parsed.
    pub fn status(config: &AppConfig) -> Result<DaemonStatus, DaemonError> {
        let recorded = PidFile::new(config.pid_path()).read();
        let live = recorded.filter(|&p| pid::is_alive(p));
        let mut state = JsonStore::<DaemonState>::new(config.daemon_state_path())
            .load()?
            .unwrap_or_default();
        state.running &= live.is_some();

        Ok(DaemonStatus {
            running: live.is_some(),
            pid: live,
            stale_pid_file: recorded.is_some() && live.is_none(),
            state,
        })
    }

    /// Sends SIGTERM to the daemon recorded in the PID file.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` without a live recorded PID, or `Signal` if
    /// delivery fails.
    pub fn request_stop(config: &AppConfig) -> Result<u32, DaemonError> {
        let pid = PidFile::new(config.pid_path())
            .live_pid()
            .ok_or(DaemonError::NotRunning)?;
        pid::terminate(pid).map_err(DaemonError::Signal)?;
        info!(pid, "Sent SIGTERM to daemon");
        Ok(pid)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Runs every task that is due, then records progress.
    ///
    /// A failing task is logged and kept in the bounded error list; the
    /// remaining tasks of the pass still run.
    pub async fn run_pass(&mut self) {
        let now = self.clock.now();
        self.sync_kill_switch().await;

        for task in self.schedule.due(now) {
            let result = match task {
                Task::OpenOrders => self.check_open_orders().await,
                Task::Portfolio => self.snapshot_portfolio().await,
                Task::RiskCheck => self.check_risk_limits().await,
                Task::Strategies => self.run_strategies().await,
                Task::Sentiment => self.check_sentiment().await,
            };
            if let Err(e) = result {
                self.record_failure(task, &e);
            }
            self.schedule.mark(task, now);
        }

        self.state.last_check = Some(now);
        self.state.checks_performed += 1;
        if self.state.checks_performed % self.config.persist_every_passes.max(1) == 0 {
            self.persist_state();
        }
    }

    fn record_failure(&mut self, task: Task, e: &anyhow::Error) {
        let message = format!("{e:#}");
        error!(task = %task, error = %message, "Daemon task failed");
        self.state.record_error(
            TaskFailure {
                timestamp: self.clock.now(),
                task: task.as_str().to_string(),
                message,
            },
            self.config.max_errors,
        );
    }

    fn persist_state(&self) {
        if let Err(e) = self.store.save(&self.state) {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist daemon state"
            );
        }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs.max(1))
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Counts open orders per exchange and settles tracked orders that left
    /// the book. A vanished order is treated as filled at its limit price.
    async fn check_open_orders(&mut self) -> Result<()> {
        let timeout = self.call_timeout();
        let mut filled = Vec::new();
        let mut failures = Vec::new();

        for exchange in self.exchange.available_exchanges() {
            let orders = match bounded(
                &exchange,
                timeout,
                self.exchange.get_open_orders(&exchange, None),
            )
            .await
            {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(exchange = %exchange, error = %e, "Open order check failed");
                    failures.push(e.to_string());
                    continue;
                }
            };

            self.open_orders.insert(exchange.clone(), orders.len());
            let live: HashSet<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();
            let gone: Vec<(String, String)> = self
                .tracked
                .keys()
                .filter(|(ex, id)| ex == &exchange && !live.contains(id.as_str()))
                .cloned()
                .collect();
            filled.extend(gone.iter().filter_map(|key| self.tracked.remove(key)));
            debug!(exchange = %exchange, open = orders.len(), "Open orders checked");
        }

        let mut follow_ups = Vec::new();
        for order in filled {
            let fill = OrderFill {
                order_id: order.order_id,
                exchange: order.signal.exchange.clone(),
                symbol: order.signal.symbol.clone(),
                side: order.signal.side,
                amount: order.signal.amount,
                price: order.price,
                fee: Decimal::ZERO,
                timestamp: self.clock.now(),
            };
            follow_ups.extend(self.apply_fill(&order.signal, fill).await);
        }
        self.submit_all(follow_ups).await;

        if !failures.is_empty() {
            bail!("open order check failed: {}", failures.join("; "));
        }
        Ok(())
    }

    /// Values every balance in quote terms and hands the total to the risk gate.
    ///
    /// The value is only recorded when every exchange and holding could be
    /// priced; a partial sum would read as a drawdown.
    async fn snapshot_portfolio(&self) -> Result<()> {
        let timeout = self.call_timeout();
        let quote = &self.config.valuation_quote;
        let mut total = Decimal::ZERO;
        let mut failures = Vec::new();

        for exchange in self.exchange.available_exchanges() {
            let balance =
                match bounded(&exchange, timeout, self.exchange.get_balance(&exchange)).await {
                    Ok(balance) => balance,
                    Err(e) => {
                        warn!(exchange = %exchange, error = %e, "Balance fetch failed");
                        failures.push(e.to_string());
                        continue;
                    }
                };

            for (asset, holding) in &balance.assets {
                if holding.total.is_zero() {
                    continue;
                }
                if self.config.quote_assets.iter().any(|q| q == asset) {
                    total += holding.total;
                    continue;
                }
                let symbol = format!("{asset}/{quote}");
                match bounded(&exchange, timeout, self.exchange.get_ticker(&exchange, &symbol))
                    .await
                {
                    Ok(ticker) => total += holding.total * ticker.last,
                    Err(e) => {
                        warn!(exchange = %exchange, asset = %asset, error = %e, "Could not price holding");
                        failures.push(e.to_string());
                    }
                }
            }
        }

        if !failures.is_empty() {
            bail!("portfolio snapshot incomplete: {}", failures.join("; "));
        }
        self.risk.update_portfolio_value(total);
        debug!(value = %total, "Portfolio snapshot");
        Ok(())
    }

    /// Warns ahead of the daily-loss and drawdown ceilings, once per UTC day
    /// per rule, and sends the previous day's summary when the day turns.
    async fn check_risk_limits(&mut self) -> Result<()> {
        let status = self.risk.status();

        if self.risk_day != Some(status.date) {
            if let Some(previous) = self.risk_day {
                self.send_daily_summary(previous).await;
            }
            self.risk_day = Some(status.date);
            self.risk_alerts.clear();
        }

        let readings = [
            (
                RiskRule::MaxDailyLoss,
                status.daily_loss_pct,
                status.max_daily_loss_pct,
                status.daily_loss_utilization(),
            ),
            (
                RiskRule::MaxDrawdown,
                status.drawdown_pct,
                status.max_drawdown_pct,
                status.drawdown_utilization(),
            ),
        ];

        for (rule, value, limit, utilization) in readings {
            if utilization < self.config.risk_warning_ratio {
                continue;
            }
            let breached = utilization >= Decimal::ONE;
            if !self.risk_alerts.insert((rule, breached)) {
                continue;
            }

            let value = value.round_dp(2);
            if breached {
                warn!(rule = %rule, value = %value, limit = %limit, "Risk limit reached, new orders will be rejected");
                self.notifier
                    .send_alert(
                        types::RISK_LIMIT,
                        json!({
                            "rule": rule,
                            "strategy": "all",
                            "message": format!("{rule} at {value}% (limit {limit}%)"),
                        }),
                    )
                    .await;
            } else {
                warn!(rule = %rule, value = %value, limit = %limit, "Risk limit approaching");
                self.notifier
                    .send_alert(
                        types::RISK_WARNING,
                        json!({
                            "rule": rule,
                            "value_pct": value,
                            "limit_pct": limit,
                            "utilization_pct": (utilization * Decimal::ONE_HUNDRED).round_dp(1),
                        }),
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn send_daily_summary(&self, day: NaiveDate) {
        let state = self.risk.state();
        let trades: Vec<_> = state
            .trade_log
            .iter()
            .filter(|t| t.timestamp.date_naive() == day)
            .collect();
        let pnl: Decimal = trades.iter().map(|t| t.pnl).sum();

        info!(%day, pnl = %pnl, trades = trades.len(), "Daily summary");
        self.notifier
            .send_alert(
                types::DAILY_SUMMARY,
                json!({
                    "date": day.to_string(),
                    "daily_pnl": pnl,
                    "trades_today": trades.len(),
                    "portfolio_value": state.current_portfolio_value,
                    "drawdown_pct": state.drawdown_pct().round_dp(2),
                }),
            )
            .await;
    }

    async fn run_strategies(&mut self) -> Result<()> {
        if self.risk.is_killed() {
            debug!("Kill switch active, strategy evaluation skipped");
            return Ok(());
        }

        let signals = self.engine.evaluate_all().await;
        if !signals.is_empty() {
            info!(signals = signals.len(), "Submitting strategy signals");
        }
        self.submit_all(signals).await;
        Ok(())
    }

    async fn check_sentiment(&self) -> Result<()> {
        let Some(analyzer) = &self.sentiment else {
            return Ok(());
        };
        let threshold = self.config.sentiment_alert_threshold;
        let mut failures = Vec::new();

        for symbol in &self.config.sentiment_symbols {
            match tokio::time::timeout(self.call_timeout(), analyzer.get_quick_sentiment(symbol))
                .await
            {
                Ok(Ok(sentiment)) => {
                    debug!(symbol = %symbol, score = sentiment.score, label = %sentiment.label, "Sentiment reading");
                    if sentiment.score.abs() >= threshold {
                        self.notifier
                            .send_alert(
                                types::SENTIMENT_ALERT,
                                json!({
                                    "symbol": symbol,
                                    "score": format!("{:.2}", sentiment.score),
                                    "label": sentiment.label,
                                }),
                            )
                            .await;
                    }
                }
                Ok(Err(e)) => {
                    warn!(symbol = %symbol, error = %e, "Sentiment check failed");
                    failures.push(format!("{symbol}: {e:#}"));
                }
                Err(_) => {
                    warn!(symbol = %symbol, "Sentiment check timed out");
                    failures.push(format!("{symbol}: timed out"));
                }
            }
        }

        if !failures.is_empty() {
            bail!("sentiment check failed: {}", failures.join("; "));
        }
        Ok(())
    }

    // =========================================================================
    // Order flow
    // =========================================================================

    /// Submits signals in order, feeding counter-signals from immediate fills
    /// back into the queue.
    async fn submit_all(&mut self, signals: Vec<TradeSignal>) {
        let mut queue = VecDeque::from(signals);
        while let Some(signal) = queue.pop_front() {
            if let Some(fill) = self.submit(&signal).await {
                queue.extend(self.apply_fill(&signal, fill).await);
            }
        }
    }

    /// Re-validates one signal against live numbers and places it.
    ///
    /// Returns the fill when the exchange executed the order immediately.
    async fn submit(&mut self, signal: &TradeSignal) -> Option<OrderFill> {
        let timeout = self.call_timeout();
        let exchange = signal.exchange.as_str();

        let reference_price = match signal.price {
            Some(price) => price,
            None => {
                match bounded(exchange, timeout, self.exchange.get_ticker(exchange, &signal.symbol))
                    .await
                {
                    Ok(ticker) => ticker.last,
                    Err(e) => {
                        self.order_failed(signal, &e.to_string()).await;
                        return None;
                    }
                }
            }
        };

        let open_order_count =
            match bounded(exchange, timeout, self.exchange.get_open_orders(exchange, None)).await {
                Ok(orders) => orders.len(),
                Err(e) => {
                    self.order_failed(signal, &e.to_string()).await;
                    return None;
                }
            };
        self.open_orders.insert(exchange.to_string(), open_order_count);

        let check = OrderCheck {
            strategy: signal.strategy_name.as_deref(),
            exchange,
            symbol: &signal.symbol,
            side: signal.side,
            amount: signal.amount,
            price: reference_price,
            portfolio_value: self.risk.status().current_portfolio_value,
            open_order_count,
        };
        if let Err(rejection) = self.risk.validate_order(&check) {
            let strategy = signal
                .strategy_name
                .as_deref()
                .or(signal.strategy_id.as_deref())
                .unwrap_or("manual");
            self.notifier
                .send_alert(
                    types::STRATEGY_ERROR,
                    json!({
                        "strategy": strategy,
                        "strategy_id": signal.strategy_id,
                        "rule": rejection.rule,
                        "symbol": signal.symbol,
                        "error": rejection.to_string(),
                    }),
                )
                .await;
            return None;
        }

        let placed = match bounded(
            exchange,
            timeout,
            self.exchange.place_order(
                exchange,
                &signal.symbol,
                signal.side,
                signal.amount,
                signal.price,
                signal.order_type,
            ),
        )
        .await
        {
            Ok(placed) => placed,
            Err(e) => {
                self.order_failed(signal, &e.to_string()).await;
                return None;
            }
        };

        info!(
            order_id = %placed.order_id,
            exchange,
            symbol = %signal.symbol,
            side = %signal.side,
            amount = %signal.amount,
            order_type = %signal.order_type,
            reason = %signal.reason,
            "Order placed"
        );

        if let Some(fill) = placed.to_fill(self.clock.now()) {
            return Some(fill);
        }
        *self.open_orders.entry(exchange.to_string()).or_default() += 1;
        self.tracked.insert(
            (exchange.to_string(), placed.order_id.clone()),
            TrackedOrder {
                order_id: placed.order_id,
                signal: signal.clone(),
                price: placed.price.unwrap_or(reference_price),
            },
        );
        None
    }

    /// Books a fill with its strategy and the risk ledger, and announces it.
    ///
    /// Returns the strategy's counter-signal, if any.
    async fn apply_fill(&self, signal: &TradeSignal, fill: OrderFill) -> Option<TradeSignal> {
        let mut pnl = Decimal::ZERO;
        let mut follow_up = None;
        if let Some(strategy_id) = signal.strategy_id.as_deref() {
            match self.engine.on_order_filled(strategy_id, &fill).await {
                Ok(outcome) => {
                    pnl = outcome.realized_pnl;
                    follow_up = outcome.follow_up;
                }
                Err(e) => {
                    warn!(strategy_id, error = %e, "Fill for a strategy that is no longer registered");
                }
            }
        }

        self.risk.record_trade(TradeRecord {
            timestamp: fill.timestamp,
            strategy: signal.strategy_name.clone(),
            exchange: fill.exchange.clone(),
            symbol: fill.symbol.clone(),
            side: fill.side,
            amount: fill.amount,
            price: fill.price,
            pnl,
        });

        self.notifier
            .send_alert(
                types::TRADE_EXECUTED,
                json!({
                    "side": fill.side,
                    "amount": fill.amount,
                    "symbol": fill.symbol,
                    "price": fill.price,
                    "exchange": fill.exchange,
                    "strategy": signal.strategy_name,
                    "pnl": pnl,
                }),
            )
            .await;
        follow_up
    }

    async fn order_failed(&self, signal: &TradeSignal, error: &str) {
        warn!(
            exchange = %signal.exchange,
            symbol = %signal.symbol,
            error,
            "Order submission failed"
        );
        self.notifier
            .send_alert(
                types::ORDER_FAILED,
                json!({
                    "side": signal.side,
                    "symbol": signal.symbol,
                    "exchange": signal.exchange,
                    "strategy": signal.strategy_name,
                    "error": error,
                }),
            )
            .await;
    }

    // =========================================================================
    // Kill switch
    // =========================================================================

    /// Activates the kill switch, cancels every open order and alerts.
    ///
    /// Returns the number of orders cancelled. An exchange that fails to
    /// cancel is logged and skipped.
    pub async fn emergency_stop(&mut self, reason: &str) -> usize {
        self.risk.activate_kill_switch(reason);
        let cancelled = self.cancel_everything().await;
        self.notifier
            .send_alert(
                types::KILL_SWITCH,
                json!({ "reason": reason, "orders_cancelled": cancelled }),
            )
            .await;
        cancelled
    }

    /// Picks up a kill switch flipped by another process.
    async fn sync_kill_switch(&mut self) {
        if self.risk.sync_kill_switch() != Some(true) {
            return;
        }
        let reason = self
            .risk
            .status()
            .kill_reason
            .unwrap_or_else(|| "external".to_string());
        let cancelled = self.cancel_everything().await;
        self.notifier
            .send_alert(
                types::KILL_SWITCH,
                json!({ "reason": reason, "orders_cancelled": cancelled }),
            )
            .await;
    }

    async fn cancel_everything(&mut self) -> usize {
        let timeout = self.call_timeout();
        let mut cancelled = 0;

        for exchange in self.exchange.available_exchanges() {
            match bounded(&exchange, timeout, self.exchange.cancel_all_orders(&exchange)).await {
                Ok(count) => {
                    info!(exchange = %exchange, cancelled = count, "Cancelled open orders");
                    cancelled += count;
                    self.tracked.retain(|(ex, _), _| ex != &exchange);
                    self.open_orders.insert(exchange, 0);
                }
                Err(e) => {
                    error!(exchange = %exchange, error = %e, "Failed to cancel open orders");
                }
            }
        }
        cancelled
    }
}

fn listen_for_signals(stop: Arc<AtomicBool>) -> Result<JoinHandle<()>, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, stopping after the current pass");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), stopping after the current pass");
            }
        }
        stop.store(true, Ordering::SeqCst);
    }))
}
