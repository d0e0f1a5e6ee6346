//! The loop node.
//!
//! A loop re-enters itself through its `body` edge and leaves through `done`.
//! It keeps no state of its own: the dispatcher counts completed iterations
//! and the executor reads the count through [`Context::loop_index`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        consts::{BRANCH_HANDLE, CURRENT_ITEM, DEFAULT_ITEM_VARIABLE, ITERATION_COMPLETE, LOOP_BODY_HANDLE, LOOP_DONE_HANDLE, LOOP_INDEX},
        executors::{NodeExecutor, NodeOutput, conditional::lookup, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoopConfig {
    /// array, variable name or template resolving to an array
    #[serde(default)]
    items: Option<Value>,
    /// ends the loop once this variable is truthy
    #[serde(default)]
    until_variable: Option<String>,
    #[serde(default = "default_item_variable")]
    item_variable: String,
}

fn default_item_variable() -> String {
    DEFAULT_ITEM_VARIABLE.to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopExecutor;

impl LoopExecutor {
    fn items(
        ctx: &Context,
        node: &Node,
        items: &Value,
    ) -> Result<Vec<Value>, NodeExecutionError> {
        let resolved = match items {
            Value::String(s) => lookup(ctx, s).unwrap_or(Value::Null),
            other => ctx.resolve_json(other),
        };
        match resolved {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(NodeExecutionError::config(format!("loop {} items resolved to a non-array value: {}", node.id, other))),
        }
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[async_trait]
impl NodeExecutor for LoopExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Loop
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "items": { "type": ["array", "string"] },
                "untilVariable": { "type": "string", "minLength": 1 },
                "itemVariable": { "type": "string", "minLength": 1 },
                "maxIterations": { "type": "integer", "minimum": 0 }
            }
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: LoopConfig = parse_config(node, &self.schema())?;
        let index = ctx.loop_index(&node.id);

        let current = match (&config.items, &config.until_variable) {
            (Some(items), _) => Self::items(&ctx, node, items)?.into_iter().nth(index as usize),
            (None, Some(until)) => (!truthy(ctx.get(until).as_ref())).then(|| Value::from(index)),
            (None, None) => return Err(NodeExecutionError::config(format!("loop {} needs either items or untilVariable", node.id))),
        };

        let output = match current {
            Some(item) => {
                let mut emitted = Vars::new();
                emitted.insert(config.item_variable.clone(), item.clone());
                let output = json!({
                    ITERATION_COMPLETE: false,
                    CURRENT_ITEM: item,
                    LOOP_INDEX: index,
                    BRANCH_HANDLE: LOOP_BODY_HANDLE,
                });
                NodeOutput::new(output, emitted)
            }
            None => {
                let output = json!({
                    ITERATION_COMPLETE: true,
                    CURRENT_ITEM: Value::Null,
                    LOOP_INDEX: index,
                    BRANCH_HANDLE: LOOP_DONE_HANDLE,
                });
                NodeOutput::new(output, Vars::new())
            }
        };
        Ok(output)
    }
}
