use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        consts::DEFAULT_HANDLE,
        executors::{
            NodeExecutor, NodeOutput,
            conditional::{ComparisonOperator, evaluate, lookup},
            parse_config,
        },
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchCase {
    pub value: Value,
    /// edge handle taken on match; the case value rendered as text when absent
    #[serde(default)]
    pub handle: Option<String>,
}

impl SwitchCase {
    fn handle(&self) -> String {
        match (&self.handle, &self.value) {
            (Some(handle), _) => handle.clone(),
            (None, Value::String(s)) => s.clone(),
            (None, other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SwitchConfig {
    variable: String,
    #[serde(default)]
    cases: Vec<SwitchCase>,
}

/// Multi-way branch on the value of one variable. The first matching case wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchExecutor;

#[async_trait]
impl NodeExecutor for SwitchExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Switch
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "variable": { "type": "string", "minLength": 1 },
                "cases": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "value": {},
                            "handle": { "type": "string" }
                        },
                        "required": ["value"]
                    }
                }
            },
            "required": ["variable"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: SwitchConfig = parse_config(node, &self.schema())?;
        let actual = lookup(&ctx, &config.variable);

        let matched = config.cases.iter().find(|case| {
            let expected = ctx.resolve_json(&case.value);
            evaluate(actual.as_ref(), ComparisonOperator::Eq, Some(&expected))
        });
        let handle = matched.map(SwitchCase::handle).unwrap_or_else(|| DEFAULT_HANDLE.to_string());

        let mut emitted = Vars::new();
        if let Some(name) = node.output_variable() {
            emitted.set(name, &handle);
        }
        Ok(NodeOutput::new(
            json!({ "value": actual.unwrap_or(Value::Null), "matched": matched.is_some(), "branchHandle": handle }),
            emitted,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::executors::testing;

    fn switch_node() -> Node {
        testing::node(
            NodeType::Switch,
            json!({
                "variable": "intent",
                "cases": [
                    {"value": "refund", "handle": "billing"},
                    {"value": "hello"},
                    {"value": 3}
                ]
            }),
        )
    }

    #[tokio::test]
    async fn test_case_handle() {
        let (ctx, _rx) = testing::context(Vars::new().with("intent", "refund"));
        let out = SwitchExecutor.execute(&switch_node(), ctx).await.unwrap();
        assert_eq!(out.branch_handle(), Some("billing"));
        assert_eq!(out.output["matched"], json!(true));
    }

    #[tokio::test]
    async fn test_case_value_as_handle() {
        let (ctx, _rx) = testing::context(Vars::new().with("intent", "hello"));
        let out = SwitchExecutor.execute(&switch_node(), ctx).await.unwrap();
        assert_eq!(out.branch_handle(), Some("hello"));

        let (ctx, _rx) = testing::context(Vars::new().with("intent", "3"));
        let out = SwitchExecutor.execute(&switch_node(), ctx).await.unwrap();
        assert_eq!(out.branch_handle(), Some("3"));
    }

    #[tokio::test]
    async fn test_default_handle() {
        let (ctx, _rx) = testing::context(Vars::new().with("intent", "other"));
        let out = SwitchExecutor.execute(&switch_node(), ctx).await.unwrap();
        assert_eq!(out.branch_handle(), Some("default"));
        assert_eq!(out.output["matched"], json!(false));

        let (ctx, _rx) = testing::context(Vars::new());
        let out = SwitchExecutor.execute(&switch_node(), ctx).await.unwrap();
        assert_eq!(out.branch_handle(), Some("default"));
    }
}
