//! Workflow edge definitions for connecting nodes.
//!
//! Edges of branching nodes carry a source handle naming the branch they belong
//! to (`true`/`false` for conditionals, case handles for switches, `body`/`done`
//! for loops). A missing, empty or `default` handle marks the default path.

use serde::{Deserialize, Serialize};

use crate::{model::EdgeModel, workflow::consts::DEFAULT_HANDLE, workflow::node::NodeId};

/// Unique identifier for an edge within a workflow.
pub type EdgeId = String;

/// Runtime edge representation connecting two nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Unique edge identifier.
    pub id: EdgeId,
    /// ID of the source node.
    pub source: NodeId,
    /// ID of the target node.
    pub target: NodeId,
    /// Which output handle this edge connects from.
    pub source_handle: Option<String>,
}

impl Edge {
    /// Edge taken when no handle matches.
    pub fn is_default(&self) -> bool {
        match self.source_handle.as_deref() {
            None => true,
            Some(handle) => handle.is_empty() || handle == DEFAULT_HANDLE,
        }
    }

    pub fn matches(
        &self,
        handle: &str,
    ) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }
}

impl From<&EdgeModel> for Edge {
    fn from(model: &EdgeModel) -> Self {
        Self {
            id: model.id.clone(),
            source: model.source.clone(),
            target: model.target.clone(),
            source_handle: model.source_handle.clone(),
        }
    }
}
