use crate::error::{RiskLimitExceeded, RiskRule};
use crate::limits::RiskLimits;
use crate::state::{RiskState, TradeRecord};
use autotrader_core::clock::{Clock, SystemClock};
use autotrader_core::config::RiskConfig;
use autotrader_core::events::OrderSide;
use autotrader_core::persistence::JsonStore;
use chrono::NaiveDate;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Arguments of one pre-trade check.
#[derive(Debug, Clone, Copy)]
pub struct OrderCheck<'a> {
    /// Strategy name used to resolve per-strategy limit overrides.
    pub strategy: Option<&'a str>,
    pub exchange: &'a str,
    pub symbol: &'a str,
    pub side: OrderSide,
    pub amount: Decimal,
    /// Limit price, or the reference price for a market order.
    pub price: Decimal,
    pub portfolio_value: Decimal,
    pub open_order_count: usize,
}

/// Snapshot of the ledger, rolled to the current UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskStatus {
    pub date: NaiveDate,
    pub daily_pnl: Decimal,
    pub daily_loss_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub drawdown_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub portfolio_ath: Decimal,
    pub current_portfolio_value: Decimal,
    pub trades_today: u32,
    pub killed: bool,
    pub kill_reason: Option<String>,
}

impl RiskStatus {
    /// Daily loss as a fraction of its ceiling (1 means at the limit).
    #[must_use]
    pub fn daily_loss_utilization(&self) -> Decimal {
        utilization(self.daily_loss_pct, self.max_daily_loss_pct)
    }

    /// Drawdown as a fraction of its ceiling (1 means at the limit).
    #[must_use]
    pub fn drawdown_utilization(&self) -> Decimal {
        utilization(self.drawdown_pct, self.max_drawdown_pct)
    }
}

fn utilization(value: Decimal, ceiling: Decimal) -> Decimal {
    if ceiling <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    value / ceiling
}

/// Pre-trade risk gate and owner of the [`RiskState`] ledger.
///
/// All mutation is serialized under one lock and written to disk before the
/// lock is released. A failed write is logged; the in-memory state stays
/// authoritative until the next successful save, except that a kill switch
/// found active on disk is never overwritten by a save.
pub struct RiskManager {
    config: RiskConfig,
    state: Mutex<RiskState>,
    store: JsonStore<RiskState>,
    clock: Arc<dyn Clock>,
    /// Set when a save adopted a kill switch activated by another process.
    adopted_kill: AtomicBool,
}

impl RiskManager {
    /// Creates a risk manager backed by `path`, using the system clock.
    #[must_use]
    pub fn new(config: RiskConfig, path: impl Into<PathBuf>) -> Self {
        Self::with_clock(config, path, Arc::new(SystemClock))
    }

    /// Creates a risk manager with an explicit time source.
    ///
    /// The ledger is loaded once here. A missing or unreadable file starts a
    /// fresh ledger for today.
    #[must_use]
    pub fn with_clock(config: RiskConfig, path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let store: JsonStore<RiskState> = JsonStore::new(path);
        let today = clock.today();
        let state = match store.load() {
            Ok(Some(state)) => {
                info!(
                    path = %store.path().display(),
                    killed = state.killed,
                    ath = %state.portfolio_ath,
                    "Loaded risk state"
                );
                state
            }
            Ok(None) => RiskState::new(today),
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Failed to load risk state, starting fresh"
                );
                RiskState::new(today)
            }
        };

        if state.killed {
            warn!(reason = ?state.kill_reason, "Kill switch is active from a previous run");
        }

        Self {
            config,
            state: Mutex::new(state),
            store,
            clock,
            adopted_kill: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Effective hard limits for `strategy`.
    #[must_use]
    pub fn limits_for(&self, strategy: Option<&str>) -> RiskLimits {
        RiskLimits::resolve(&self.config, strategy)
    }

    // =========================================================================
    // Pre-trade validation
    // =========================================================================

    /// Checks an order against every rule in priority order.
    ///
    /// Observing a portfolio value above the stored all-time high raises it
    /// before the rules run.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule: `kill_switch`, `max_order_size`,
    /// `max_open_orders`, `max_position_size`, `max_daily_loss`, `max_drawdown`.
    pub fn validate_order(&self, check: &OrderCheck<'_>) -> Result<(), RiskLimitExceeded> {
        let mut state = self.lock_rolled();

        if check.portfolio_value > Decimal::ZERO && state.observe_portfolio_value(check.portfolio_value)
        {
            self.persist(&mut state);
        }

        let result = Self::evaluate_rules(&state, &self.limits_for(check.strategy), check);
        match &result {
            Ok(()) => debug!(
                exchange = check.exchange,
                symbol = check.symbol,
                side = %check.side,
                amount = %check.amount,
                "Order passed risk checks"
            ),
            Err(e) => warn!(
                rule = %e.rule,
                strategy = ?check.strategy,
                exchange = check.exchange,
                symbol = check.symbol,
                "{}",
                e.message
            ),
        }
        result
    }

    fn evaluate_rules(
        state: &RiskState,
        limits: &RiskLimits,
        check: &OrderCheck<'_>,
    ) -> Result<(), RiskLimitExceeded> {
        if state.killed {
            return Err(RiskLimitExceeded::new(
                RiskRule::KillSwitch,
                format!(
                    "kill switch active: {}",
                    state.kill_reason.as_deref().unwrap_or("no reason given")
                ),
            ));
        }

        let order_value = check.amount * check.price;
        if order_value > limits.max_order_size_usd {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxOrderSize,
                format!(
                    "order value {} exceeds max {}",
                    order_value.round_dp(2),
                    limits.max_order_size_usd
                ),
            ));
        }

        if check.open_order_count >= limits.max_open_orders {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxOpenOrders,
                format!(
                    "{} open orders, max {}",
                    check.open_order_count, limits.max_open_orders
                ),
            ));
        }

        if check.portfolio_value <= Decimal::ZERO {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxPositionSize,
                "portfolio value unknown, cannot size position",
            ));
        }
        let position_pct = order_value / check.portfolio_value * Decimal::ONE_HUNDRED;
        if position_pct > limits.max_position_size_pct {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxPositionSize,
                format!(
                    "order is {}% of portfolio, max {}%",
                    position_pct.round_dp(2),
                    limits.max_position_size_pct
                ),
            ));
        }

        let daily_loss_pct = state.daily_loss_pct(check.portfolio_value);
        if daily_loss_pct > Decimal::ZERO && daily_loss_pct >= limits.max_daily_loss_pct {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxDailyLoss,
                format!(
                    "daily loss {}% reached max {}%",
                    daily_loss_pct.round_dp(2),
                    limits.max_daily_loss_pct
                ),
            ));
        }

        let drawdown_pct = state.drawdown_pct();
        if drawdown_pct > Decimal::ZERO && drawdown_pct >= limits.max_drawdown_pct {
            return Err(RiskLimitExceeded::new(
                RiskRule::MaxDrawdown,
                format!(
                    "drawdown {}% reached max {}%",
                    drawdown_pct.round_dp(2),
                    limits.max_drawdown_pct
                ),
            ));
        }

        Ok(())
    }

    // =========================================================================
    // Ledger updates
    // =========================================================================

    /// Adds a realized trade to today's bucket.
    pub fn record_trade(&self, trade: TradeRecord) {
        let mut state = self.lock_rolled();
        state.daily_pnl += trade.pnl;
        state.trades_today += 1;

        info!(
            strategy = ?trade.strategy,
            symbol = %trade.symbol,
            side = %trade.side,
            pnl = %trade.pnl,
            daily_pnl = %state.daily_pnl,
            "Recorded trade"
        );

        state.push_trade(trade, self.config.trade_log_limit);
        self.persist(&mut state);
    }

    /// Records a portfolio valuation, raising the all-time high when exceeded.
    pub fn update_portfolio_value(&self, value: Decimal) {
        let mut state = self.lock_rolled();
        if state.observe_portfolio_value(value) {
            debug!(value = %value, ath = %state.portfolio_ath, "Portfolio value updated");
            self.persist(&mut state);
        }
    }

    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.lock_rolled().daily_pnl
    }

    #[must_use]
    pub fn portfolio_ath(&self) -> Decimal {
        self.lock_rolled().portfolio_ath
    }

    /// Copy of the ledger as of now.
    #[must_use]
    pub fn state(&self) -> RiskState {
        self.lock_rolled().clone()
    }

    #[must_use]
    pub fn status(&self) -> RiskStatus {
        let state = self.lock_rolled();
        RiskStatus {
            date: state.date,
            daily_pnl: state.daily_pnl,
            daily_loss_pct: state.daily_loss_pct(state.current_portfolio_value),
            max_daily_loss_pct: self.config.max_daily_loss_pct,
            drawdown_pct: state.drawdown_pct(),
            max_drawdown_pct: self.config.max_drawdown_pct,
            portfolio_ath: state.portfolio_ath,
            current_portfolio_value: state.current_portfolio_value,
            trades_today: state.trades_today,
            killed: state.killed,
            kill_reason: state.kill_reason.clone(),
        }
    }

    // =========================================================================
    // Exit checks
    // =========================================================================

    /// True when the loss from `entry` to `current` is at least the stop-loss percentage.
    #[must_use]
    pub fn check_stop_loss(&self, entry: Decimal, current: Decimal) -> bool {
        let rule = self.config.stop_loss;
        if !rule.enabled || entry <= Decimal::ZERO {
            return false;
        }
        (entry - current) / entry * Decimal::ONE_HUNDRED >= rule.pct
    }

    /// True when price has fallen from `highest` by at least the trailing percentage.
    #[must_use]
    pub fn check_trailing_stop(&self, highest: Decimal, current: Decimal) -> bool {
        let rule = self.config.trailing_stop;
        if !rule.enabled || highest <= Decimal::ZERO {
            return false;
        }
        (highest - current) / highest * Decimal::ONE_HUNDRED >= rule.pct
    }

    /// True when the gain from `entry` to `current` is at least the take-profit percentage.
    #[must_use]
    pub fn check_take_profit(&self, entry: Decimal, current: Decimal) -> bool {
        let rule = self.config.take_profit;
        if !rule.enabled || entry <= Decimal::ZERO {
            return false;
        }
        (current - entry) / entry * Decimal::ONE_HUNDRED >= rule.pct
    }

    /// Fraction of the position to exit at the highest partial level reached.
    ///
    /// Returns zero when disabled or when no level has been reached.
    #[must_use]
    pub fn check_partial_take_profit(&self, entry: Decimal, current: Decimal) -> Decimal {
        let cfg = &self.config.partial_take_profit;
        if !cfg.enabled || entry <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let gain_pct = (current - entry) / entry * Decimal::ONE_HUNDRED;
        cfg.levels
            .iter()
            .filter(|level| gain_pct >= level.gain_pct)
            .max_by(|a, b| a.gain_pct.cmp(&b.gain_pct))
            .map_or(Decimal::ZERO, |level| level.fraction.min(Decimal::ONE))
    }

    // =========================================================================
    // Kill switch
    // =========================================================================

    /// Halts all trading until [`Self::deactivate_kill_switch`] is called.
    pub fn activate_kill_switch(&self, reason: &str) {
        let mut state = self.lock_rolled();
        state.killed = true;
        state.kill_reason = Some(reason.to_string());
        state.killed_at = Some(self.clock.now());
        error!(reason, "KILL SWITCH ACTIVATED");
        self.persist(&mut state);
    }

    pub fn deactivate_kill_switch(&self) {
        let mut state = self.lock_rolled();
        if !state.killed {
            return;
        }
        state.killed = false;
        state.kill_reason = None;
        state.killed_at = None;
        warn!("Kill switch deactivated, trading resumes");
        self.save(&state);
    }

    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.state.lock().killed
    }

    /// Adopts the kill switch flag written to disk by another process.
    ///
    /// Returns `Some(killed)` when the in-memory flag changed since the last
    /// call, including an activation already picked up by a save. An
    /// unreadable file leaves the current flag in place.
    pub fn sync_kill_switch(&self) -> Option<bool> {
        let adopted = self.adopted_kill.swap(false, Ordering::SeqCst);
        let persisted = match self.store.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return adopted.then_some(true),
            Err(e) => {
                debug!(error = %e, "Could not re-read risk state");
                return adopted.then_some(true);
            }
        };

        let mut state = self.state.lock();
        if state.killed == persisted.killed {
            return (adopted && state.killed).then_some(true);
        }
        state.killed = persisted.killed;
        state.kill_reason = persisted.kill_reason;
        state.killed_at = persisted.killed_at;
        warn!(
            killed = state.killed,
            reason = ?state.kill_reason,
            "Kill switch changed externally"
        );
        Some(state.killed)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Acquires the ledger lock and lazily rolls the daily bucket.
    fn lock_rolled(&self) -> MutexGuard<'_, RiskState> {
        let mut state = self.state.lock();
        let today = self.clock.today();
        let previous = state.date;
        if state.roll_to(today) {
            info!(%previous, %today, "New UTC day, daily P&L reset");
            self.persist(&mut state);
        }
        state
    }

    /// Saves `state`, first adopting a kill switch another process activated
    /// on disk so the save cannot clear it.
    fn persist(&self, state: &mut RiskState) {
        if !state.killed {
            self.adopt_disk_kill(state);
        }
        self.save(state);
    }

    fn adopt_disk_kill(&self, state: &mut RiskState) {
        let disk = match self.store.load() {
            Ok(Some(disk)) if disk.killed => disk,
            Ok(_) => return,
            Err(e) => {
                debug!(error = %e, "Could not re-read risk state before save");
                return;
            }
        };
        state.killed = true;
        state.kill_reason = disk.kill_reason;
        state.killed_at = disk.killed_at;
        self.adopted_kill.store(true, Ordering::SeqCst);
        warn!(reason = ?state.kill_reason, "Kill switch activated externally");
    }

    fn save(&self, state: &RiskState) {
        if let Err(e) = self.store.save(state) {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist risk state"
            );
        }
    }
}
