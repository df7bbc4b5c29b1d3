//! Read-only and signalling commands that work against the data directory.

use anyhow::Result;
use autotrader_core::AppConfig;
use autotrader_daemon::MonitorDaemon;
use autotrader_risk::RiskManager;
use autotrader_strategy::StrategyEngine;
use serde_json::{json, Value};

/// # Errors
/// Returns an error if no daemon is running or it cannot be signalled.
pub fn run_stop(config: &AppConfig) -> Result<Value> {
    let pid = MonitorDaemon::request_stop(config)?;
    Ok(json!({ "ok": true, "signalled": pid }))
}

/// # Errors
/// Returns an error if the daemon state file is unreadable.
pub fn run_status(config: &AppConfig) -> Result<Value> {
    let status = MonitorDaemon::status(config)?;
    Ok(json!({ "ok": true, "daemon": status }))
}

#[must_use]
pub fn run_risk_status(config: &AppConfig) -> Value {
    let risk = RiskManager::new(config.risk.clone(), config.risk_state_path());
    let status = risk.status();
    json!({
        "ok": true,
        "daily_loss_utilization": status.daily_loss_utilization().round_dp(4),
        "drawdown_utilization": status.drawdown_utilization().round_dp(4),
        "risk": status,
    })
}

/// # Errors
/// Returns an error if the strategy state file is unreadable.
pub fn run_strategies(config: &AppConfig) -> Result<Value> {
    let strategies = StrategyEngine::read_state_file(config.strategy_state_path())?;
    Ok(json!({
        "ok": true,
        "count": strategies.len(),
        "strategies": strategies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_status_on_empty_data_dir() {
        let dir = TempDir::new().unwrap();
        let out = run_status(&config(&dir)).unwrap();
        assert_eq!(out["ok"], json!(true));
        assert_eq!(out["daemon"]["running"], json!(false));
    }

    #[test]
    fn test_stop_without_daemon_fails() {
        let dir = TempDir::new().unwrap();
        assert!(run_stop(&config(&dir)).is_err());
    }

    #[test]
    fn test_strategies_on_empty_data_dir() {
        let dir = TempDir::new().unwrap();
        let out = run_strategies(&config(&dir)).unwrap();
        assert_eq!(out["count"], json!(0));
    }

    #[test]
    fn test_risk_status_reports_kill_switch() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        RiskManager::new(config.risk.clone(), config.risk_state_path()).activate_kill_switch("test");

        let out = run_risk_status(&config);
        assert_eq!(out["risk"]["killed"], json!(true));
        assert_eq!(out["risk"]["kill_reason"], json!("test"));
    }
}
