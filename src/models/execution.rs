//! Execution log (spec §3.3, §4.7): append-only records of tool-driven
//! execution of a work item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown execution status '{other}'")),
        }
    }
}

/// An append-only execution-log entry (spec §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    #[serde(default)]
    pub work_item_id: Option<String>,
    pub action: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Seconds, set once the execution reaches a terminal state.
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ExecutionRecord {
    #[must_use]
    pub fn new(work_item_id: Option<String>, action: impl Into<String>, agent_id: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            work_item_id,
            action: action.into(),
            status: ExecutionStatus::Pending,
            agent_id,
            details: None,
            error_message: None,
            duration_seconds: None,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Execution state machine transition (spec §4.7). Returns `false` if
    /// the transition is not legal from the current state.
    pub fn transition(&mut self, event: ExecutionEvent) -> bool {
        use ExecutionEvent::{Cancel, Complete, Fail, Start};
        use ExecutionStatus::{Cancelled, Failed, Pending, Running, Succeeded};

        let next = match (self.status, event) {
            (Pending, Start) => Running,
            (Running, Complete) => Succeeded,
            (Running, Fail) => Failed,
            (Running, Cancel) => Cancelled,
            _ => return false,
        };
        self.status = next;
        if next.is_terminal() {
            self.duration_seconds =
                Some((Utc::now() - self.timestamp).num_milliseconds() as f64 / 1000.0);
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEvent {
    Start,
    Complete,
    Fail,
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_running_to_succeeded() {
        let mut rec = ExecutionRecord::new(None, "execute", None);
        assert!(rec.transition(ExecutionEvent::Start));
        assert_eq!(rec.status, ExecutionStatus::Running);
        assert!(rec.transition(ExecutionEvent::Complete));
        assert_eq!(rec.status, ExecutionStatus::Succeeded);
        assert!(rec.duration_seconds.is_some());
    }

    #[test]
    fn terminal_states_reject_further_events() {
        let mut rec = ExecutionRecord::new(None, "execute", None);
        rec.transition(ExecutionEvent::Start);
        rec.transition(ExecutionEvent::Complete);
        assert!(!rec.transition(ExecutionEvent::Cancel));
        assert!(!rec.transition(ExecutionEvent::Start));
    }

    #[test]
    fn cancel_only_from_running() {
        let mut rec = ExecutionRecord::new(None, "execute", None);
        assert!(!rec.transition(ExecutionEvent::Cancel));
        rec.transition(ExecutionEvent::Start);
        assert!(rec.transition(ExecutionEvent::Cancel));
        assert_eq!(rec.status, ExecutionStatus::Cancelled);
    }
}
