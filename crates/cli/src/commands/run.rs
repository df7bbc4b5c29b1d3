//! Foreground daemon command.
//!
//! Restores persisted strategies (or starts every enabled configured one on a
//! clean data directory) and runs the monitor loop until SIGTERM or SIGINT.

use anyhow::{bail, Result};
use autotrader_core::{AppConfig, ExchangeManager, PaperExchange};
use autotrader_daemon::{DaemonError, MonitorDaemon, StartOutcome};
use autotrader_notifier::Notifier;
use autotrader_risk::RiskManager;
use autotrader_strategy::StrategyEngine;
use clap::Args;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Trade against the in-memory paper exchange
    #[arg(long)]
    pub paper: bool,
}

/// Runs the monitor daemon in the foreground.
///
/// # Errors
/// Returns an error if another daemon is live, no exchange backend is
/// available, or startup persistence fails.
pub async fn run_daemon(config: AppConfig, args: RunArgs) -> Result<Value> {
    if let Some(pid) = MonitorDaemon::status(&config)?.pid {
        return Err(DaemonError::AlreadyRunning(pid).into());
    }
    if !args.paper {
        bail!("no live exchange backend is configured; pass --paper to use the paper exchange");
    }

    let exchange: Arc<dyn ExchangeManager> = Arc::new(PaperExchange::new(config.exchanges.clone()));
    let risk = Arc::new(RiskManager::new(config.risk.clone(), config.risk_state_path()));
    let engine = Arc::new(
        StrategyEngine::new(
            config.strategies.clone(),
            Arc::clone(&exchange),
            Arc::clone(&risk),
            config.strategy_state_path(),
        )
        .with_call_timeout(Duration::from_secs(config.daemon.call_timeout_secs)),
    );

    let restored = engine.restore().await?;
    if restored == 0 {
        for (name, strategy) in config.strategies.iter().filter(|(_, s)| s.enabled) {
            match engine.start_strategy(name, Map::new()).await {
                Ok(started) => info!(strategy_id = %started.id, active = started.active, "Started configured strategy"),
                Err(e) => warn!(strategy = %name, error = %e, "Could not start configured strategy"),
            }
        }
    }

    let notifier = Arc::new(Notifier::new(&config.notifications)?);
    let mut daemon = MonitorDaemon::new(&config, exchange, risk, engine, notifier);

    match daemon.start().await? {
        StartOutcome::AlreadyRunning { pid } => Err(DaemonError::AlreadyRunning(pid).into()),
        outcome @ StartOutcome::Stopped { .. } => Ok(json!({
            "ok": true,
            "result": outcome,
            "checks_performed": daemon.state().checks_performed,
            "errors": daemon.state().errors.len(),
        })),
    }
}
