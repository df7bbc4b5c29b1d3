use anyhow::Result;
use autotrader_core::AppConfig;
use autotrader_daemon::MonitorDaemon;
use autotrader_notifier::{types, Notifier};
use autotrader_risk::RiskManager;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

#[derive(Args, Debug, Clone)]
pub struct KillSwitchArgs {
    #[command(subcommand)]
    pub action: KillSwitchAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum KillSwitchAction {
    /// Halt all trading
    On {
        /// Why trading is being halted
        #[arg(long)]
        reason: String,
    },
    /// Resume trading
    Off,
}

/// Flips the persisted kill switch.
///
/// A running daemon picks the flag up on its next pass, cancels open orders
/// and sends the alert itself. Without a daemon the alert is sent from here.
///
/// # Errors
/// Returns an error if the daemon status or notifier configuration cannot be read.
pub async fn run_kill_switch(config: &AppConfig, args: KillSwitchArgs) -> Result<Value> {
    let risk = RiskManager::new(config.risk.clone(), config.risk_state_path());
    let daemon_running = MonitorDaemon::status(config)?.running;

    match args.action {
        KillSwitchAction::On { reason } => {
            risk.activate_kill_switch(&reason);
            if !daemon_running {
                let notifier = Notifier::new(&config.notifications)?;
                notifier
                    .send_alert(
                        types::KILL_SWITCH,
                        json!({ "reason": reason, "orders_cancelled": 0 }),
                    )
                    .await;
            }
            Ok(json!({
                "ok": true,
                "killed": true,
                "reason": reason,
                "daemon_running": daemon_running,
            }))
        }
        KillSwitchAction::Off => {
            risk.deactivate_kill_switch();
            Ok(json!({
                "ok": true,
                "killed": false,
                "daemon_running": daemon_running,
            }))
        }
    }
}
