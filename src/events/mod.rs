//! Event types for workflow execution.
//!
//! Executions publish [`ExecutionEvent`]s wrapped in an [`Envelope`] that names
//! the execution (and node) they belong to. Subscribers filter on those ids.

mod execution;
mod node;

pub use execution::*;
pub use node::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils;

/// An event together with the execution it belongs to.
///
/// Serialized, this is exactly the gateway's server frame:
/// `{type, executionId, nodeId?, timestamp, payload}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ExecutionEvent,
}

impl Envelope {
    pub fn new(
        execution_id: &str,
        event: ExecutionEvent,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            node_id: event.node_id().map(str::to_string),
            timestamp: utils::time::now(),
            event,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }
}
