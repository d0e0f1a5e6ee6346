use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    error::NodeExecutionError,
    providers::DatabaseClient,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseConfig {
    connection_id: String,
    query: String,
    /// positional parameters; strings may be templates
    #[serde(default)]
    params: Vec<Value>,
    #[serde(default)]
    output_variable: Option<String>,
}

/// Runs a parameterized query through the [`DatabaseClient`].
///
/// The query text itself is not templated, values go through `params`.
pub struct DatabaseExecutor {
    client: Arc<dyn DatabaseClient>,
}

impl DatabaseExecutor {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            client,
        }
    }
}

#[async_trait]
impl NodeExecutor for DatabaseExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::Database
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "connectionId": { "type": "string", "minLength": 1 },
                "query": { "type": "string", "minLength": 1 },
                "params": { "type": "array" },
                "outputVariable": { "type": "string" }
            },
            "required": ["connectionId", "query"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: DatabaseConfig = parse_config(node, &self.schema())?;
        let params: Vec<Value> = config.params.iter().map(|p| ctx.resolve_json(p)).collect();

        debug!(execution_id = %ctx.execution_id(), node_id = %node.id, connection_id = %config.connection_id, "running query");
        let rows = self.client.query(&config.connection_id, &config.query, &params).await?;
        Ok(NodeOutput::with_variable(config.output_variable.as_deref(), rows))
    }
}
