mod models;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    runtime::Context,
    workflow::{
        consts::{FALSE_HANDLE, TRUE_HANDLE},
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

pub use models::*;

/// Two-way branch on a list of conditions.
///
/// Output: `{result, branchHandle: "true" | "false"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalExecutor;

impl ConditionalExecutor {
    fn process_conditions(
        ctx: &Context,
        conditions: &[Condition],
        logical_operator: LogicalOperator,
    ) -> bool {
        let mut results = conditions.iter().map(|condition| {
            let actual = lookup(ctx, &condition.variable);
            let expected = condition.value.as_ref().map(|v| ctx.resolve_json(v));
            evaluate(actual.as_ref(), condition.operator, expected.as_ref())
        });

        match logical_operator {
            LogicalOperator::And => results.all(|r| r),
            LogicalOperator::Or => results.any(|r| r),
        }
    }
}

/// A bare name reads the variable; anything with a placeholder is resolved as a template.
pub(crate) fn lookup(
    ctx: &Context,
    variable: &str,
) -> Option<Value> {
    if variable.contains("{{") {
        Some(ctx.resolve_value(variable)).filter(|v| !v.is_null())
    } else {
        ctx.get(variable.trim())
    }
}

/// Evaluate a single comparison
pub fn evaluate(
    actual: Option<&Value>,
    operator: ComparisonOperator,
    expected: Option<&Value>,
) -> bool {
    match operator {
        ComparisonOperator::Null => matches!(actual, None | Some(Value::Null)),
        ComparisonOperator::NotNull => !matches!(actual, None | Some(Value::Null)),
        ComparisonOperator::Empty => is_empty(actual),
        ComparisonOperator::NotEmpty => !is_empty(actual),
        _ => {
            let (Some(actual), Some(expected)) = (actual, expected) else {
                return false;
            };
            evaluate_with_value(actual, operator, expected)
        }
    }
}

fn is_empty(actual: Option<&Value>) -> bool {
    match actual {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(arr)) => arr.is_empty(),
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => false,
    }
}

/// Evaluate comparison operators that require a value
fn evaluate_with_value(
    actual: &Value,
    operator: ComparisonOperator,
    expected: &Value,
) -> bool {
    match operator {
        ComparisonOperator::Contains => eval_contains(actual, expected),
        ComparisonOperator::NotContains => !eval_contains(actual, expected),
        ComparisonOperator::StartWith => matches!(actual, Value::String(s) if s.starts_with(&text(expected))),
        ComparisonOperator::EndWith => matches!(actual, Value::String(s) if s.ends_with(&text(expected))),
        ComparisonOperator::Is => text(actual) == text(expected),
        ComparisonOperator::IsNot => text(actual) != text(expected),
        ComparisonOperator::In => eval_in(actual, expected),
        ComparisonOperator::NotIn => !eval_in(actual, expected),
        ComparisonOperator::AllOf => eval_all_of(actual, expected),
        ComparisonOperator::Eq => eval_eq(actual, expected),
        ComparisonOperator::Ne => !eval_eq(actual, expected),
        ComparisonOperator::Gt => eval_cmp(actual, expected, |a, b| a > b),
        ComparisonOperator::Lt => eval_cmp(actual, expected, |a, b| a < b),
        ComparisonOperator::Ge => eval_cmp(actual, expected, |a, b| a >= b),
        ComparisonOperator::Le => eval_cmp(actual, expected, |a, b| a <= b),
        ComparisonOperator::Null | ComparisonOperator::NotNull | ComparisonOperator::Empty | ComparisonOperator::NotEmpty => false,
    }
}

/// Strings render raw, everything else as JSON text.
fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn eval_contains(
    actual: &Value,
    expected: &Value,
) -> bool {
    match actual {
        Value::String(s) => s.contains(&text(expected)),
        Value::Array(arr) => arr.iter().any(|v| text(v) == text(expected)),
        _ => false,
    }
}

fn eval_in(
    actual: &Value,
    expected: &Value,
) -> bool {
    match expected {
        Value::Array(list) => list.iter().any(|v| text(v) == text(actual)),
        Value::String(s) => s.contains(&text(actual)),
        _ => false,
    }
}

fn eval_all_of(
    actual: &Value,
    expected: &Value,
) -> bool {
    match (actual, expected) {
        (Value::Array(arr), Value::Array(list)) => list.iter().all(|e| arr.iter().any(|v| text(v) == text(e))),
        _ => false,
    }
}

fn eval_eq(
    actual: &Value,
    expected: &Value,
) -> bool {
    match (number(actual), number(expected)) {
        (Some(a), Some(e)) => a == e,
        _ => text(actual) == text(expected),
    }
}

fn eval_cmp<F>(
    actual: &Value,
    expected: &Value,
    cmp: F,
) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (number(actual), number(expected)) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}

#[async_trait]
impl NodeExecutor for ConditionalExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Conditional
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "logicalOperator": { "type": "string", "enum": ["and", "or"] },
                "conditions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "variable": { "type": "string" },
                            "operator": {
                                "type": "string",
                                "enum": [
                                    "contains", "notContains", "startWith", "endWith", "is", "isNot", "empty", "notEmpty",
                                    "in", "notIn", "allOf", "eq", "ne", "gt", "lt", "ge", "le", "null", "notNull"
                                ]
                            },
                            "value": {}
                        },
                        "required": ["variable", "operator"]
                    }
                }
            },
            "required": ["conditions"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: ConditionalConfig = parse_config(node, &self.schema())?;
        let result = Self::process_conditions(&ctx, &config.conditions, config.logical_operator);
        let handle = if result { TRUE_HANDLE } else { FALSE_HANDLE };

        let mut emitted = Vars::new();
        if let Some(name) = node.output_variable() {
            emitted.set(name, result);
        }
        Ok(NodeOutput::new(json!({ "result": result, "branchHandle": handle }), emitted))
    }
}
