//! Voice nodes: speech synthesis and waiting on the user's spoken answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::NodeExecutionError,
    providers::VoiceProvider,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeakConfig {
    text: String,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    output_variable: Option<String>,
}

pub struct VoiceSpeakExecutor {
    voice: Arc<dyn VoiceProvider>,
}

impl VoiceSpeakExecutor {
    pub fn new(voice: Arc<dyn VoiceProvider>) -> Self {
        Self {
            voice,
        }
    }
}

#[async_trait]
impl NodeExecutor for VoiceSpeakExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::VoiceSpeak
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "voice": { "type": "string" },
                "outputVariable": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: SpeakConfig = parse_config(node, &self.schema())?;
        let text = ctx.resolve_template(&config.text);
        let audio = self.voice.speak(&text, config.voice.as_deref()).await?;
        Ok(NodeOutput::with_variable(config.output_variable.as_deref(), audio))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenConfig {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    output_variable: Option<String>,
}

/// Suspends the node in `waiting` until the user submits a response.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceListenExecutor;

#[async_trait]
impl NodeExecutor for VoiceListenExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::VoiceListen
    }

    fn schema(&self) -> Value {
        json!({
            "type": ["object", "null"],
            "properties": {
                "prompt": { "type": "string" },
                "outputVariable": { "type": "string" }
            }
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: ListenConfig = if node.config.is_null() { ListenConfig::default() } else { parse_config(node, &self.schema())? };
        let prompt = config.prompt.as_deref().map(|p| ctx.resolve_template(p));
        let response = ctx.wait_for_input(node, prompt).await?;
        Ok(NodeOutput::with_variable(config.output_variable.as_deref(), response))
    }
}
