//! Per-execution scheduler.
//!
//! Node tasks report back to the dispatcher through [`Signal`]s; the dispatcher is
//! the only writer of the variable store, the timeline and the execution record.

mod dispatcher;
mod retry;

use chrono::{DateTime, Utc};

use crate::{
    error::{ErrorKind, NodeExecutionError},
    events::LogEntry,
    workflow::{executors::NodeOutput, node::NodeId},
};

pub use dispatcher::Dispatcher;
pub use retry::RetryPolicy;

/// Messages from node tasks to their dispatcher.
#[derive(Debug)]
pub enum Signal {
    Log(LogEntry),
    Done(NodeCompletion),
}

/// Final result of one scheduled node, after retries.
#[derive(Debug)]
pub struct NodeCompletion {
    pub node_id: NodeId,
    /// nodes visited on the way here, this node included
    pub path: Vec<NodeId>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub result: Result<NodeOutput, NodeFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl NodeFailure {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<NodeExecutionError> for NodeFailure {
    fn from(err: NodeExecutionError) -> Self {
        Self {
            kind: err.kind.into(),
            message: err.message,
        }
    }
}
