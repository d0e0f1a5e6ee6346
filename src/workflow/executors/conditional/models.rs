use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ComparisonOperator {
    // for string or array
    Contains,
    NotContains,
    StartWith,
    EndWith,
    Is,
    IsNot,
    Empty,
    NotEmpty,
    In,
    NotIn,
    AllOf,
    // for number
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Null,
    NotNull,
}

impl ComparisonOperator {
    /// Unary operators ignore `value`.
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::Empty | Self::NotEmpty | Self::Null | Self::NotNull)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// variable name, dotted path or `{{template}}`
    pub variable: String,
    pub operator: ComparisonOperator,
    /// compared value; strings may be templates
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalConfig {
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}
