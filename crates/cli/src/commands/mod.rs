//! CLI commands. Each returns the JSON object printed to stdout.

pub mod inspect;
pub mod kill_switch;
pub mod run;

pub use inspect::{run_risk_status, run_status, run_stop, run_strategies};
pub use kill_switch::{run_kill_switch, KillSwitchArgs};
pub use run::{run_daemon, RunArgs};
