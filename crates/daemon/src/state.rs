use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One task failure kept in the daemon's bounded error list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub timestamp: DateTime<Utc>,
    pub task: String,
    pub message: String,
}

/// Liveness and progress of the monitor loop, persisted to `daemon_state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonState {
    pub running: bool,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub checks_performed: u64,
    /// Most recent failures, oldest first.
    pub errors: Vec<TaskFailure>,
}

impl DaemonState {
    /// Appends a failure, dropping the oldest entries beyond `limit`.
    pub fn record_error(&mut self, failure: TaskFailure, limit: usize) {
        self.errors.push(failure);
        if self.errors.len() > limit {
            let excess = self.errors.len() - limit;
            self.errors.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(i: usize) -> TaskFailure {
        TaskFailure {
            timestamp: Utc::now(),
            task: "open_orders".to_string(),
            message: format!("failure {i}"),
        }
    }

    #[test]
    fn test_error_list_keeps_most_recent() {
        let mut state = DaemonState::default();
        for i in 0..60 {
            state.record_error(failure(i), 50);
        }
        assert_eq!(state.errors.len(), 50);
        assert_eq!(state.errors[0].message, "failure 10");
        assert_eq!(state.errors[49].message, "failure 59");
    }

    #[test]
    fn test_missing_fields_default() {
        let state: DaemonState = serde_json::from_str(r#"{ "running": true }"#).unwrap();
        assert!(state.running);
        assert_eq!(state.checks_performed, 0);
        assert!(state.errors.is_empty());
    }
}
