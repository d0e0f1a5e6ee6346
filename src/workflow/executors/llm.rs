use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::NodeExecutionError,
    events::{AgentMessage, ExecutionEvent},
    providers::{LlmProvider, LlmRequest},
    runtime::Context,
    workflow::{
        consts::DEFAULT_LLM_OUTPUT,
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmConfig {
    prompt: String,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default = "default_output_variable")]
    output_variable: String,
}

fn default_output_variable() -> String {
    DEFAULT_LLM_OUTPUT.to_string()
}

/// Sends the rendered prompt to the configured [`LlmProvider`] and
/// publishes the answer as an agent message.
pub struct LlmExecutor {
    provider: Arc<dyn LlmProvider>,
}

impl LlmExecutor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
        }
    }
}

#[async_trait]
impl NodeExecutor for LlmExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Llm
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string" },
                "systemPrompt": { "type": "string" },
                "model": { "type": "string" },
                "temperature": { "type": "number", "minimum": 0 },
                "maxTokens": { "type": "integer", "minimum": 1 },
                "outputVariable": { "type": "string", "minLength": 1 }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: LlmConfig = parse_config(node, &self.schema())?;
        let request = LlmRequest {
            model: config.model.clone(),
            system_prompt: config.system_prompt.as_deref().map(|s| ctx.resolve_template(s)),
            prompt: ctx.resolve_template(&config.prompt),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        debug!(execution_id = %ctx.execution_id(), node_id = %node.id, model = ?request.model, "calling llm");
        let response = self.provider.complete(request).await?;

        ctx.publish(ExecutionEvent::AgentMessage(AgentMessage {
            node_id: node.id.clone(),
            role: "assistant".to_string(),
            content: response.content.clone(),
            model: response.model.clone().or(config.model),
        }));

        Ok(NodeOutput::with_variable(Some(&config.output_variable), Value::String(response.content)))
    }
}
