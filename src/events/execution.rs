use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{common::Vars, error::ErrorKind, events::TimelineEvent, utils};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Append-only log line scoped to one execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: utils::longid(),
            level,
            message: message.into(),
            node_id: None,
            node_name: None,
            metadata: None,
            timestamp: utils::time::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_node(
        mut self,
        node_id: &str,
        node_name: &str,
    ) -> Self {
        self.node_id = Some(node_id.to_string());
        self.node_name = Some(node_name.to_string());
        self
    }

    pub fn with_metadata(
        mut self,
        metadata: Value,
    ) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStarted {
    pub workflow_id: String,
    pub workflow_name: String,
    pub inputs: Vars,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableUpdate {
    pub name: String,
    pub value: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub node_id: String,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCompleted {
    pub outputs: Vars,
    pub duration_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailed {
    pub error: String,
    pub error_kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCancelled {
    pub reason: String,
}

/// Everything an execution publishes on the event bus.
///
/// Serializes adjacently tagged, which is the `{type, payload}` half of a
/// gateway frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ExecutionEvent {
    #[serde(rename = "execution:started")]
    Started(ExecutionStarted),
    #[serde(rename = "node:started")]
    NodeStarted(TimelineEvent),
    #[serde(rename = "node:waiting")]
    NodeWaiting(TimelineEvent),
    #[serde(rename = "node:completed")]
    NodeCompleted(TimelineEvent),
    #[serde(rename = "execution:log")]
    Log(LogEntry),
    #[serde(rename = "variable:updated")]
    VariableUpdated(VariableUpdate),
    #[serde(rename = "agent:message:new")]
    AgentMessage(AgentMessage),
    #[serde(rename = "execution:completed")]
    Completed(ExecutionCompleted),
    #[serde(rename = "execution:failed")]
    Failed(ExecutionFailed),
    #[serde(rename = "execution:cancelled")]
    Cancelled(ExecutionCancelled),
}

impl ExecutionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ExecutionEvent::Started(_) => "execution:started",
            ExecutionEvent::NodeStarted(_) => "node:started",
            ExecutionEvent::NodeWaiting(_) => "node:waiting",
            ExecutionEvent::NodeCompleted(_) => "node:completed",
            ExecutionEvent::Log(_) => "execution:log",
            ExecutionEvent::VariableUpdated(_) => "variable:updated",
            ExecutionEvent::AgentMessage(_) => "agent:message:new",
            ExecutionEvent::Completed(_) => "execution:completed",
            ExecutionEvent::Failed(_) => "execution:failed",
            ExecutionEvent::Cancelled(_) => "execution:cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionEvent::Completed(_) | ExecutionEvent::Failed(_) | ExecutionEvent::Cancelled(_))
    }

    /// Node the event is about, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionEvent::NodeStarted(e) | ExecutionEvent::NodeWaiting(e) | ExecutionEvent::NodeCompleted(e) => Some(&e.node_id),
            ExecutionEvent::Log(l) => l.node_id.as_deref(),
            ExecutionEvent::AgentMessage(m) => Some(&m.node_id),
            ExecutionEvent::Failed(f) => f.node_id.as_deref(),
            _ => None,
        }
    }
}
