mod script;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

pub use script::Language;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeConfig {
    language: Language,
    code: String,
    /// argument name to template
    #[serde(default)]
    inputs: HashMap<String, Value>,
    #[serde(default)]
    output_variable: Option<String>,
}

/// Runs a user script on a blocking thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExecutor;

#[async_trait]
impl NodeExecutor for CodeExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Code
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "language": { "type": "string", "enum": ["javascript", "python3"] },
                "code": { "type": "string", "minLength": 1 },
                "inputs": { "type": "object" },
                "outputVariable": { "type": "string" }
            },
            "required": ["language", "code"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: CodeConfig = parse_config(node, &self.schema())?;
        let inputs: serde_json::Map<String, Value> = config.inputs.iter().map(|(name, template)| (name.clone(), ctx.resolve_json(template))).collect();

        let CodeConfig {
            language,
            code,
            output_variable,
            ..
        } = config;
        let result = tokio::task::spawn_blocking(move || language.run(&code, Value::Object(inputs)))
            .await
            .map_err(|e| NodeExecutionError::config(format!("script of node {} panicked: {}", node.id, e)))??;

        Ok(NodeOutput::with_variable(output_variable.as_deref(), result))
    }
}
