use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        consts::ENV_VARIABLE,
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    /// used when the execution inputs lack the field; strings may be templates
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InputConfig {
    #[serde(default)]
    fields: Vec<InputField>,
}

/// Entry node. Checks the declared fields against the execution inputs.
///
/// Without declared fields the output is every input variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputExecutor;

#[async_trait]
impl NodeExecutor for InputExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Input
    }

    fn schema(&self) -> Value {
        json!({
            "type": ["object", "null"],
            "properties": {
                "fields": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "required": { "type": "boolean" },
                            "default": {}
                        },
                        "required": ["name"]
                    }
                }
            }
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: InputConfig = if node.config.is_null() { InputConfig::default() } else { parse_config(node, &self.schema())? };

        if config.fields.is_empty() {
            let mut vars = ctx.snapshot();
            vars.remove(ENV_VARIABLE);
            return Ok(NodeOutput::new(Value::from(vars), Vars::new()));
        }

        let mut emitted = Vars::new();
        for field in &config.fields {
            let value = match ctx.get(&field.name).filter(|v| !v.is_null()) {
                Some(v) => v,
                None => match &field.default {
                    Some(default) => ctx.resolve_json(default),
                    None if field.required => return Err(NodeExecutionError::config(format!("missing required input '{}'", field.name))),
                    None => Value::Null,
                },
            };
            emitted.insert(field.name.clone(), value);
        }
        Ok(NodeOutput::new(Value::from(emitted.clone()), emitted))
    }
}
