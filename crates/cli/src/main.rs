use anyhow::Context;
use autotrader_core::ConfigLoader;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod commands;

use commands::{KillSwitchArgs, RunArgs};

#[derive(Parser)]
#[command(name = "autotrader")]
#[command(about = "Autonomous trading risk and execution daemon", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "AUTOTRADER_CONFIG", default_value = "config/autotrader.toml")]
    config: PathBuf,

    /// Layer `<config-stem>.<profile>.toml` over the base config
    #[arg(long, global = true, env = "AUTOTRADER_PROFILE")]
    profile: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor daemon in the foreground
    Run(RunArgs),
    /// Ask a running daemon to shut down
    Stop,
    /// Show daemon liveness and progress
    Status,
    /// Activate or clear the global kill switch
    KillSwitch(KillSwitchArgs),
    /// Show the risk ledger and limit utilization
    RiskStatus,
    /// List persisted strategy instances
    Strategies,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        println!("{}", json!({ "ok": false, "error": format!("{e:#}") }));
        return ExitCode::FAILURE;
    }

    match execute(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "Command failed");
            println!("{}", json!({ "ok": false, "error": message }));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr (or the given file) so stdout carries only JSON.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn execute(cli: Cli) -> anyhow::Result<Value> {
    let config = match cli.profile.as_deref() {
        Some(profile) => ConfigLoader::load_with_profile(&cli.config, profile),
        None => ConfigLoader::load(&cli.config),
    }
    .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => commands::run_daemon(config, args).await,
        Commands::Stop => commands::run_stop(&config),
        Commands::Status => commands::run_status(&config),
        Commands::KillSwitch(args) => commands::run_kill_switch(&config, args).await,
        Commands::RiskStatus => Ok(commands::run_risk_status(&config)),
        Commands::Strategies => commands::run_strategies(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::kill_switch::KillSwitchAction;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "autotrader",
            "run",
            "--paper",
            "--config",
            "custom.toml",
            "--log-file",
            "daemon.log",
            "--profile",
            "paper",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.log_file, Some(PathBuf::from("daemon.log")));
        assert_eq!(cli.profile.as_deref(), Some("paper"));
        assert!(matches!(cli.command, Commands::Run(RunArgs { paper: true })));
    }

    #[test]
    fn test_kill_switch_on_requires_reason() {
        assert!(Cli::try_parse_from(["autotrader", "kill-switch", "on"]).is_err());

        let cli =
            Cli::try_parse_from(["autotrader", "kill-switch", "on", "--reason", "flash crash"])
                .unwrap();
        let Commands::KillSwitch(args) = cli.command else {
            panic!("expected kill-switch");
        };
        assert!(matches!(
            args.action,
            KillSwitchAction::On { ref reason } if reason == "flash crash"
        ));
    }

    #[test]
    fn test_kebab_case_subcommands() {
        assert!(matches!(
            Cli::try_parse_from(["autotrader", "risk-status"]).unwrap().command,
            Commands::RiskStatus
        ));
        assert!(matches!(
            Cli::try_parse_from(["autotrader", "strategies"]).unwrap().command,
            Commands::Strategies
        ));
    }
}
