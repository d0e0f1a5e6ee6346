use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::NodeExecutionError,
    providers::KnowledgeBase,
    runtime::Context,
    workflow::{
        executors::{NodeExecutor, NodeOutput, parse_config},
        node::{Node, NodeType},
    },
};

const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseConfig {
    knowledge_base_id: String,
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    output_variable: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

pub struct KnowledgeBaseExecutor {
    knowledge_base: Arc<dyn KnowledgeBase>,
}

impl KnowledgeBaseExecutor {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>) -> Self {
        Self {
            knowledge_base,
        }
    }
}

#[async_trait]
impl NodeExecutor for KnowledgeBaseExecutor {
    fn node_type(&self) -> NodeType {
        NodeType::KnowledgeBaseQuery
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "knowledgeBaseId": { "type": "string", "minLength": 1 },
                "query": { "type": "string" },
                "topK": { "type": "integer", "minimum": 1 },
                "outputVariable": { "type": "string" }
            },
            "required": ["knowledgeBaseId", "query"]
        })
    }

    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError> {
        let config: KnowledgeBaseConfig = parse_config(node, &self.schema())?;
        let query = ctx.resolve_template(&config.query);
        let mut documents = self.knowledge_base.search(&config.knowledge_base_id, &query, config.top_k).await?;
        documents.truncate(config.top_k);

        Ok(NodeOutput::with_variable(config.output_variable.as_deref(), Value::Array(documents)))
    }
}
