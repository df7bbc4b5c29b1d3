//! Strategy registry and lifecycle.
//!
//! `StrategyEngine` owns every running instance, drives their hooks with a
//! shared [`StrategyContext`] and keeps the strategy state file in step with
//! the registry.

use crate::context::StrategyContext;
use crate::error::EngineError;
use crate::kind::StrategyKind;
use crate::traits::{Activation, Strategy};
use autotrader_core::clock::{Clock, SystemClock};
use autotrader_core::config::StrategyConfig;
use autotrader_core::events::{OrderFill, TradeSignal};
use autotrader_core::persistence::JsonStore;
use autotrader_core::traits::ExchangeManager;
use autotrader_risk::RiskManager;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub signals_generated: u64,
    /// Incremented only by confirmed fills.
    pub trades_executed: u64,
    pub realized_pnl: Decimal,
    pub evaluation_errors: u64,
    /// Failed evaluations since the last success.
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

/// Public view of one registered instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub id: String,
    pub kind: StrategyKind,
    pub active: bool,
    pub inactive_reason: Option<String>,
    /// Merged parameters the instance was created with.
    pub params: Value,
    pub stats: StrategyStats,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
}

/// What the engine reports after routing a fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillOutcome {
    pub realized_pnl: Decimal,
    /// Counter-signal, already tagged with the producing strategy.
    pub follow_up: Option<TradeSignal>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStrategy {
    #[serde(flatten)]
    info: StrategyInfo,
    state: Value,
}

struct StrategyInstance {
    info: StrategyInfo,
    strategy: Box<dyn Strategy>,
}

pub struct StrategyEngine {
    configs: BTreeMap<String, StrategyConfig>,
    exchange: Arc<dyn ExchangeManager>,
    risk: Arc<RiskManager>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
    store: JsonStore<Vec<Value>>,
    instances: Mutex<BTreeMap<String, StrategyInstance>>,
}

impl StrategyEngine {
    #[must_use]
    pub fn new(
        configs: BTreeMap<String, StrategyConfig>,
        exchange: Arc<dyn ExchangeManager>,
        risk: Arc<RiskManager>,
        state_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            configs,
            exchange,
            risk,
            clock: Arc::new(SystemClock),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            store: JsonStore::new(state_path),
            instances: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn context(&self) -> StrategyContext<'_> {
        StrategyContext {
            exchange: self.exchange.as_ref(),
            risk: self.risk.as_ref(),
            now: self.clock.now(),
            call_timeout: self.call_timeout,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates, starts and registers a new instance of strategy `name`.
    ///
    /// Configured params are merged under `overrides`. A strategy whose
    /// preconditions are unmet stays registered but inactive.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStrategy`, `StrategyDisabled` or `InvalidParams`.
    pub async fn start_strategy(
        &self,
        name: &str,
        overrides: Map<String, Value>,
    ) -> Result<StrategyInfo, EngineError> {
        let kind: StrategyKind = name
            .parse()
            .map_err(|_| EngineError::UnknownStrategy(name.to_string()))?;

        let config = self.configs.get(name);
        if config.is_some_and(|c| !c.enabled) {
            return Err(EngineError::StrategyDisabled(name.to_string()));
        }
        let mut merged = config.map(|c| c.params.clone()).unwrap_or_default();
        merged.extend(overrides);
        let params = Value::Object(merged);

        let mut strategy = kind
            .create(params.clone())
            .map_err(|e| EngineError::InvalidParams {
                name: name.to_string(),
                message: format!("{e:#}"),
            })?;

        let ctx = self.context();
        let (active, inactive_reason) = match strategy.on_start(&ctx).await {
            Ok(Activation::Active) => (true, None),
            Ok(Activation::Inactive(reason)) => {
                warn!(strategy = %kind, reason = %reason, "Strategy registered inactive");
                (false, Some(reason))
            }
            Err(e) => {
                error!(strategy = %kind, error = %format!("{e:#}"), "Strategy failed to start");
                (false, Some(format!("start failed: {e:#}")))
            }
        };

        let mut instances = self.instances.lock().await;
        let id = Self::fresh_id(kind, &instances);
        let info = StrategyInfo {
            id: id.clone(),
            kind,
            active,
            inactive_reason,
            params,
            stats: StrategyStats::default(),
            created_at: ctx.now,
            last_run: None,
        };
        instances.insert(
            id.clone(),
            StrategyInstance {
                info: info.clone(),
                strategy,
            },
        );
        info!(strategy_id = %id, active, "Strategy started");
        self.persist(&instances);
        Ok(info)
    }

    /// Stops and removes one instance.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no instance has this id.
    pub async fn stop_strategy(&self, id: &str) -> Result<StrategyInfo, EngineError> {
        let mut instances = self.instances.lock().await;
        let mut instance = instances
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let ctx = self.context();
        if let Err(e) = instance.strategy.on_stop(&ctx).await {
            warn!(strategy_id = %id, error = %format!("{e:#}"), "Strategy on_stop failed");
        }
        info!(strategy_id = %id, "Strategy stopped");
        self.persist(&instances);
        Ok(instance.info)
    }

    /// Stops and removes every instance, returning how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut instances = self.instances.lock().await;
        let ctx = self.context();
        let stopped = std::mem::take(&mut *instances);
        let count = stopped.len();
        for (id, mut instance) in stopped {
            if let Err(e) = instance.strategy.on_stop(&ctx).await {
                warn!(strategy_id = %id, error = %format!("{e:#}"), "Strategy on_stop failed");
            }
        }
        info!(count, "All strategies stopped");
        self.persist(&instances);
        count
    }

    /// Rebuilds instances from the strategy state file.
    ///
    /// Entries that cannot be decoded are logged and skipped. Restored
    /// instances keep their ids and are not re-started.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the file exists but cannot be read as a list.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let Some(entries) = self.store.load()? else {
            return Ok(0);
        };

        let mut instances = self.instances.lock().await;
        let mut restored = 0;
        for entry in entries {
            let persisted: PersistedStrategy = match serde_json::from_value(entry) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable strategy entry");
                    continue;
                }
            };
            let id = persisted.info.id.clone();
            if instances.contains_key(&id) {
                continue;
            }
            match persisted.info.kind.restore(persisted.state) {
                Ok(strategy) => {
                    debug!(strategy_id = %id, "Restored strategy");
                    instances.insert(
                        id,
                        StrategyInstance {
                            info: persisted.info,
                            strategy,
                        },
                    );
                    restored += 1;
                }
                Err(e) => {
                    warn!(strategy_id = %id, error = %format!("{e:#}"), "Skipping unrestorable strategy");
                }
            }
        }
        info!(restored, "Strategies restored from state file");
        Ok(restored)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluates every active instance once and returns their tagged signals.
    ///
    /// A failing strategy is logged and skipped for this sweep only.
    pub async fn evaluate_all(&self) -> Vec<TradeSignal> {
        let mut instances = self.instances.lock().await;
        let ctx = self.context();
        let mut signals = Vec::new();

        for instance in instances.values_mut().filter(|i| i.info.active) {
            let info = &mut instance.info;
            match instance.strategy.evaluate(&ctx).await {
                Ok(batch) => {
                    info.stats.signals_generated += batch.len() as u64;
                    info.stats.consecutive_errors = 0;
                    if !batch.is_empty() {
                        debug!(strategy_id = %info.id, signals = batch.len(), "Strategy produced signals");
                    }
                    signals.extend(
                        batch
                            .into_iter()
                            .map(|s| s.tagged(&info.id, info.kind.as_str())),
                    );
                }
                Err(e) => {
                    let message = format!("{e:#}");
                    error!(strategy_id = %info.id, error = %message, "Strategy evaluation failed");
                    info.stats.evaluation_errors += 1;
                    info.stats.consecutive_errors += 1;
                    info.stats.last_error = Some(message);
                }
            }
            info.last_run = Some(ctx.now);
        }

        self.persist(&instances);
        signals
    }

    /// Routes a confirmed fill to the strategy that produced the order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the strategy is no longer registered.
    pub async fn on_order_filled(
        &self,
        strategy_id: &str,
        fill: &OrderFill,
    ) -> Result<FillOutcome, EngineError> {
        let mut instances = self.instances.lock().await;
        let instance = instances
            .get_mut(strategy_id)
            .ok_or_else(|| EngineError::NotFound(strategy_id.to_string()))?;

        instance.info.stats.trades_executed += 1;
        let outcome = match instance.strategy.on_order_filled(fill) {
            Ok(effect) => {
                instance.info.stats.realized_pnl += effect.realized_pnl;
                FillOutcome {
                    realized_pnl: effect.realized_pnl,
                    follow_up: effect
                        .follow_up
                        .map(|s| s.tagged(&instance.info.id, instance.info.kind.as_str())),
                }
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(strategy_id, error = %message, "Strategy rejected fill");
                instance.info.stats.last_error = Some(message);
                FillOutcome::default()
            }
        };

        info!(
            strategy_id,
            symbol = %fill.symbol,
            side = %fill.side,
            price = %fill.price,
            pnl = %outcome.realized_pnl,
            "Fill applied"
        );
        self.persist(&instances);
        Ok(outcome)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn list(&self) -> Vec<StrategyInfo> {
        self.instances
            .lock()
            .await
            .values()
            .map(|i| i.info.clone())
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<StrategyInfo> {
        self.instances.lock().await.get(id).map(|i| i.info.clone())
    }

    pub async fn active_count(&self) -> usize {
        self.instances
            .lock()
            .await
            .values()
            .filter(|i| i.info.active)
            .count()
    }

    /// Reads the instance list from a state file without running anything.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the file cannot be read.
    pub fn read_state_file(path: impl Into<PathBuf>) -> Result<Vec<StrategyInfo>, EngineError> {
        let store: JsonStore<Vec<Value>> = JsonStore::new(path);
        Ok(store
            .load()?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<PersistedStrategy>(entry).ok())
            .map(|p| p.info)
            .collect())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn fresh_id(kind: StrategyKind, instances: &BTreeMap<String, StrategyInstance>) -> String {
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let id = format!("{kind}-{}", &suffix[..8]);
            if !instances.contains_key(&id) {
                return id;
            }
        }
    }

    fn persist(&self, instances: &BTreeMap<String, StrategyInstance>) {
        let mut entries = Vec::with_capacity(instances.len());
        for instance in instances.values() {
            let state = match instance.strategy.to_value() {
                Ok(state) => state,
                Err(e) => {
                    warn!(strategy_id = %instance.info.id, error = %e, "Failed to serialize strategy");
                    continue;
                }
            };
            let record = PersistedStrategy {
                info: instance.info.clone(),
                state,
            };
            match serde_json::to_value(&record) {
                Ok(value) => entries.push(value),
                Err(e) => warn!(strategy_id = %instance.info.id, error = %e, "Failed to encode strategy"),
            }
        }

        if let Err(e) = self.store.save(&entries) {
            warn!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist strategy state"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autotrader_core::config::RiskConfig;
    use autotrader_core::events::OrderSide;
    use autotrader_core::paper::PaperExchange;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        exchange: Arc<PaperExchange>,
        risk: Arc<RiskManager>,
    }

    fn fixture(exchanges: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let risk = Arc::new(RiskManager::new(
            RiskConfig::default(),
            dir.path().join("risk_state.json"),
        ));
        Fixture {
            exchange: Arc::new(PaperExchange::new(exchanges.iter().copied())),
            risk,
            dir,
        }
    }

    fn engine(fx: &Fixture, configs: BTreeMap<String, StrategyConfig>) -> StrategyEngine {
        StrategyEngine::new(
            configs,
            fx.exchange.clone(),
            fx.risk.clone(),
            fx.dir.path().join("strategy_state.json"),
        )
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn dca_params(exchange: &str) -> Map<String, Value> {
        params(json!({
            "exchange": exchange,
            "symbol": "BTC/USDT",
            "amount_usd": "100",
        }))
    }

    fn grid_params() -> Map<String, Value> {
        params(json!({
            "exchange": "binance",
            "symbol": "BTC/USDT",
            "price_range": ["90000", "110000"],
            "amount_per_grid": "0.001",
        }))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_same_type_twice_gets_distinct_ids() {
        let fx = fixture(&["binance"]);
        let engine = engine(&fx, BTreeMap::new());

        let a = engine.start_strategy("dca", dca_params("binance")).await.unwrap();
        let b = engine.start_strategy("dca", dca_params("binance")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("dca-"));
        assert_eq!(a.id.len(), "dca-".len() + 8);
        let ids: Vec<String> = engine.list().await.into_iter().map(|i| i.id).collect();
        assert!(ids.contains(&a.id) && ids.contains(&b.id));
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_are_rejected() {
        let fx = fixture(&["binance"]);
        let mut configs = BTreeMap::new();
        configs.insert(
            "grid".to_string(),
            StrategyConfig {
                enabled: false,
                params: Map::new(),
            },
        );
        let engine = engine(&fx, configs);

        assert!(matches!(
            engine.start_strategy("martingale", Map::new()).await,
            Err(EngineError::UnknownStrategy(_))
        ));
        assert!(matches!(
            engine.start_strategy("grid", grid_params()).await,
            Err(EngineError::StrategyDisabled(_))
        ));
        assert!(engine.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_params_are_structured_errors() {
        let fx = fixture(&["binance"]);
        let engine = engine(&fx, BTreeMap::new());

        let err = engine
            .start_strategy("grid", params(json!({ "exchange": "binance" })))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParams { ref name, .. } if name == "grid"));
    }

    #[tokio::test]
    async fn test_config_params_merge_under_overrides() {
        let fx = fixture(&["binance"]);
        let mut configs = BTreeMap::new();
        configs.insert(
            "dca".to_string(),
            StrategyConfig {
                enabled: true,
                params: params(json!({
                    "exchange": "binance",
                    "symbol": "ETH/USDT",
                    "amount_usd": "50",
                    "interval_secs": 60,
                })),
            },
        );
        let engine = engine(&fx, configs);

        let info = engine
            .start_strategy("dca", params(json!({ "amount_usd": "75" })))
            .await
            .unwrap();
        assert_eq!(info.params["symbol"], json!("ETH/USDT"));
        assert_eq!(info.params["amount_usd"], json!("75"));
        assert_eq!(info.params["interval_secs"], json!(60));
    }

    #[tokio::test]
    async fn test_unmet_preconditions_register_inactive() {
        let fx = fixture(&["binance"]);
        let engine = engine(&fx, BTreeMap::new());

        let info = engine
            .start_strategy("arbitrage", params(json!({ "symbol": "BTC/USDT", "amount": "0.01" })))
            .await
            .unwrap();

        assert!(!info.active);
        assert!(info.inactive_reason.is_some());
        assert_eq!(engine.list().await.len(), 1);
        assert_eq!(engine.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_stop_strategy_and_stop_all() {
        let fx = fixture(&["binance"]);
        let engine = engine(&fx, BTreeMap::new());
        let a = engine.start_strategy("dca", dca_params("binance")).await.unwrap();
        engine.start_strategy("dca", dca_params("binance")).await.unwrap();
        engine.start_strategy("grid", grid_params()).await.unwrap();

        engine.stop_strategy(&a.id).await.unwrap();
        assert!(engine.get(&a.id).await.is_none());
        assert!(matches!(
            engine.stop_strategy(&a.id).await,
            Err(EngineError::NotFound(_))
        ));

        assert_eq!(engine.stop_all().await, 2);
        assert!(engine.list().await.is_empty());
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    #[tokio::test]
    async fn test_failing_strategy_does_not_abort_sweep() {
        let fx = fixture(&["down", "up"]);
        fx.exchange.set_ticker("up", "BTC/USDT", dec!(100), dec!(100));
        fx.exchange.set_failing("down", true);
        let engine = engine(&fx, BTreeMap::new());

        let broken = engine.start_strategy("dca", dca_params("down")).await.unwrap();
        let healthy = engine.start_strategy("dca", dca_params("up")).await.unwrap();

        let signals = engine.evaluate_all().await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].strategy_id.as_deref(), Some(healthy.id.as_str()));
        assert_eq!(signals[0].strategy_name.as_deref(), Some("dca"));

        let broken = engine.get(&broken.id).await.unwrap();
        assert!(broken.active);
        assert_eq!(broken.stats.evaluation_errors, 1);
        assert_eq!(broken.stats.consecutive_errors, 1);
        assert!(broken.stats.last_error.is_some());

        let healthy = engine.get(&healthy.id).await.unwrap();
        assert_eq!(healthy.stats.signals_generated, 1);
        assert!(healthy.last_run.is_some());
    }

    #[tokio::test]
    async fn test_fill_counts_trade_and_tags_follow_up() {
        let fx = fixture(&["binance"]);
        let engine = engine(&fx, BTreeMap::new());
        let grid = engine.start_strategy("grid", grid_params()).await.unwrap();

        let fill = OrderFill {
            order_id: "paper-1".to_string(),
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            amount: dec!(0.001),
            price: dec!(92000),
            fee: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        let outcome = engine.on_order_filled(&grid.id, &fill).await.unwrap();

        let follow_up = outcome.follow_up.unwrap();
        assert_eq!(follow_up.price, Some(dec!(94000)));
        assert_eq!(follow_up.strategy_id.as_deref(), Some(grid.id.as_str()));
        assert_eq!(engine.get(&grid.id).await.unwrap().stats.trades_executed, 1);

        assert!(matches!(
            engine.on_order_filled("grid-missing", &fill).await,
            Err(EngineError::NotFound(_))
        ));
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[tokio::test]
    async fn test_restore_rebuilds_registry() {
        let fx = fixture(&["binance"]);
        let started = {
            let engine = engine(&fx, BTreeMap::new());
            let a = engine.start_strategy("grid", grid_params()).await.unwrap();
            let b = engine.start_strategy("dca", dca_params("binance")).await.unwrap();
            vec![a.id, b.id]
        };

        let engine = engine(&fx, BTreeMap::new());
        assert_eq!(engine.restore().await.unwrap(), 2);
        for id in &started {
            assert!(engine.get(id).await.is_some());
        }

        let on_disk =
            StrategyEngine::read_state_file(fx.dir.path().join("strategy_state.json")).unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[tokio::test]
    async fn test_restore_skips_bad_entries() {
        let fx = fixture(&["binance"]);
        let path = fx.dir.path().join("strategy_state.json");
        std::fs::write(&path, r#"[{"id": "junk"}]"#).unwrap();

        let engine = engine(&fx, BTreeMap::new());
        assert_eq!(engine.restore().await.unwrap(), 0);
    }
}
