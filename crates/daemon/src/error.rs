use autotrader_core::persistence::PersistenceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("daemon already running with pid {0}")]
    AlreadyRunning(u32),

    #[error("daemon is not running")]
    NotRunning,

    #[error("signal handling failed: {0}")]
    Signal(#[source] std::io::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
