use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfig {
    output_variable: String,
    /// template producing the value; defaults to the variable itself
    #[serde(default)]
    value: Option<Value>,
}

/// Terminal node. Its output `{outputVariable: value}` is merged into the execution outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputExecutor;

#[async_trait]
impl NodeExecutor for OutputExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Output
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "outputVariable": { "type": "string", "minLength": 1 },
                "value": {}
            },
            "required": ["outputVariable"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: OutputConfig = parse_config(node, &self.schema())?;
        let value = match &config.value {
            Some(template) => ctx.resolve_json(template),
            None => ctx.get(&config.output_variable).unwrap_or(Value::Null),
        };

        let mut output = serde_json::Map::new();
        output.insert(config.output_variable, value);
        Ok(NodeOutput::new(Value::Object(output), Vars::new()))
    }
}
