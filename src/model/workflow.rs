use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    FlowError, Result,
    model::{EdgeModel, NodeModel},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowModel {
    /// required by `deploy` and triggers, optional for one-off executions
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    /// readable from templates as `{{env.NAME}}`
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub edges: Vec<EdgeModel>,
    pub entry_point: String,
}

impl WorkflowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowModel>(s).map_err(|e| FlowError::Convert(format!("invalid workflow json: {}", e)))
    }
}
