use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ErrorKind, utils, workflow::node::Node};

/// Per-node state within one execution.
///
/// `pending -> running -> success | error`, `running -> waiting -> running` while
/// a node waits on the user, and `error -> retrying -> running` while the retry
/// budget lasts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeState {
    #[default]
    Pending,
    Running,
    Waiting,
    Retrying,
    Success,
    Error,
}

/// A node status change as shown in the execution timeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub status: NodeState,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub attempts: u32,
}

impl TimelineEvent {
    pub fn new(
        node: &Node,
        status: NodeState,
    ) -> Self {
        Self {
            id: utils::longid(),
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            node_type: node.node_type.as_ref().to_string(),
            status,
            timestamp: utils::time::now(),
            duration_ms: None,
            output: None,
            error: None,
            error_kind: None,
            attempts: 0,
        }
    }

    pub fn with_duration(
        mut self,
        started_at: DateTime<Utc>,
    ) -> Self {
        self.duration_ms = Some(utils::time::elapsed_millis(started_at, self.timestamp));
        self
    }

    pub fn with_output(
        mut self,
        output: Value,
    ) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(
        mut self,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.error_kind = Some(kind);
        self.error = Some(message.into());
        self
    }

    pub fn with_attempts(
        mut self,
        attempts: u32,
    ) -> Self {
        self.attempts = attempts;
        self
    }
}
