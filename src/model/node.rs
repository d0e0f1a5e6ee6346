use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node definition as submitted by the editor.
///
/// `type` stays a plain string here; it is parsed into a
/// [`NodeType`](crate::workflow::node::NodeType) when the workflow is validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeModel {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    /// per-node override of the engine node timeout, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// What happens after a node has exhausted its retries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorStrategy {
    /// Record success with an empty output and keep going.
    Continue,
    /// Record success with `fallbackValue` as output.
    Fallback,
    /// Record the error and jump to `gotoNode`.
    Goto,
    /// Fail the whole execution.
    #[default]
    Fail,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnError {
    #[serde(default)]
    pub strategy: ErrorStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goto_node: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// retry times
    pub times: u32,
    /// base retry interval in milliseconds, doubled on every attempt
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_node_defaults() {
        let node: NodeModel = serde_json::from_value(json!({"id": "n1", "type": "llm"})).unwrap();
        assert_eq!(node.node_type, "llm");
        assert_eq!(node.on_error.strategy, ErrorStrategy::Fail);
        assert!(node.retry.is_none());
        assert!(node.config.is_null());
    }

    #[test]
    fn test_on_error_camel_case() {
        let node: NodeModel = serde_json::from_value(json!({
            "id": "n1",
            "type": "http",
            "onError": {"strategy": "goto", "gotoNode": "recover"},
            "retry": {"times": 2, "intervalMs": 50},
            "timeoutMs": 1000
        }))
        .unwrap();
        assert_eq!(node.on_error.strategy, ErrorStrategy::Goto);
        assert_eq!(node.on_error.goto_node.as_deref(), Some("recover"));
        assert_eq!(node.retry.unwrap().interval_ms, Some(50));
        assert_eq!(node.timeout_ms, Some(1000));
    }
}
