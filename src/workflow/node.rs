use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::ValidationError,
    model::{NodeModel, OnError, RetryConfig},
    workflow::consts::OUTPUT_VARIABLE,
};

/// node id
pub type NodeId = String;

/// Every node type the editor can place on the canvas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display, strum::EnumString, strum::EnumIter)]
pub enum NodeType {
    #[serde(rename = "input")]
    #[strum(serialize = "input")]
    Input,
    #[serde(rename = "output")]
    #[strum(serialize = "output")]
    Output,
    #[serde(rename = "llm")]
    #[strum(serialize = "llm")]
    Llm,
    #[serde(rename = "conditional")]
    #[strum(serialize = "conditional")]
    Conditional,
    #[serde(rename = "switch")]
    #[strum(serialize = "switch")]
    Switch,
    #[serde(rename = "loop")]
    #[strum(serialize = "loop")]
    Loop,
    #[serde(rename = "code")]
    #[strum(serialize = "code")]
    Code,
    #[serde(rename = "http")]
    #[strum(serialize = "http")]
    Http,
    #[serde(rename = "database")]
    #[strum(serialize = "database")]
    Database,
    #[serde(rename = "voice_speak")]
    #[strum(serialize = "voice_speak")]
    VoiceSpeak,
    #[serde(rename = "voice_listen")]
    #[strum(serialize = "voice_listen")]
    VoiceListen,
    #[serde(rename = "knowledgeBaseQuery")]
    #[strum(serialize = "knowledgeBaseQuery")]
    KnowledgeBaseQuery,
}

impl NodeType {
    /// Branching nodes fire a single outgoing edge selected by handle.
    pub fn is_branching(&self) -> bool {
        matches!(self, NodeType::Conditional | NodeType::Switch | NodeType::Loop)
    }

    /// Nodes that suspend until the user submits input.
    pub fn awaits_input(&self) -> bool {
        matches!(self, NodeType::VoiceListen)
    }
}

/// Validated, immutable node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub name: String,
    pub config: Value,
    pub on_error: OnError,
    pub retry: Option<RetryConfig>,
    /// explicit per-node timeout
    pub timeout: Option<Duration>,
}

impl Node {
    /// `config.outputVariable`, when the node declares one.
    pub fn output_variable(&self) -> Option<&str> {
        self.config.get(OUTPUT_VARIABLE).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Name for logs; falls back to the id when the editor left it blank.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

impl TryFrom<&NodeModel> for Node {
    type Error = ValidationError;

    fn try_from(model: &NodeModel) -> Result<Self, Self::Error> {
        let node_type = NodeType::from_str(&model.node_type).map_err(|_| ValidationError::UnknownNodeType(model.id.clone()))?;
        Ok(Self {
            id: model.id.clone(),
            node_type,
            name: model.name.clone(),
            config: model.config.clone(),
            on_error: model.on_error.clone(),
            retry: model.retry,
            timeout: model.timeout_ms.map(Duration::from_millis),
        })
    }
}
