use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    common::Vars,
    error::ErrorKind,
    events::{LogEntry, TimelineEvent},
    utils,
};

pub type ExecutionId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled)
    }
}

/// One run of a workflow.
///
/// Owned by its dispatcher while running; the stored copy is refreshed at start,
/// after every node completion and once more at the terminal state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub inputs: Vars,
    pub outputs: Vars,
    pub variables: Vars,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub timeline: Vec<TimelineEvent>,
    pub logs: Vec<LogEntry>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn new(
        workflow_id: &str,
        workflow_name: &str,
        inputs: Vars,
    ) -> Self {
        Self {
            id: utils::execution_id(),
            workflow_id: workflow_id.to_string(),
            workflow_name: workflow_name.to_string(),
            status: ExecutionStatus::Pending,
            inputs,
            outputs: Vars::new(),
            variables: Vars::new(),
            current_node_id: None,
            error: None,
            error_kind: None,
            timeline: Vec::new(),
            logs: Vec::new(),
            started_at: utils::time::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Timeline events recorded for `node_id`, in completion order.
    pub fn node_events(
        &self,
        node_id: &str,
    ) -> Vec<&TimelineEvent> {
        self.timeline.iter().filter(|e| e.node_id == node_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_execution_is_pending() {
        let exec = Execution::new("wf", "demo", Vars::new().with("q", "hi"));
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(!exec.is_terminal());
        assert_eq!(uuid::Uuid::parse_str(&exec.id).unwrap().get_version_num(), 4);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let exec = Execution::new("wf", "demo", Vars::new());
        let value = serde_json::to_value(&exec).unwrap();
        assert!(value.get("workflowId").is_some());
        assert!(value.get("startedAt").is_some());
        assert_eq!(value["status"], "pending");
    }
}
