//! Node executors and the registry that dispatches on [`NodeType`].

pub mod code;
pub mod conditional;
pub mod database;
pub mod http;
pub mod input;
pub mod knowledge_base;
pub mod llm;
pub mod loop_node;
pub mod output;
pub mod switch;
pub mod voice;

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    common::Vars,
    error::NodeExecutionError,
    providers::Providers,
    runtime::Context,
    workflow::{
        consts::{BRANCH_HANDLE, CURRENT_ITEM, ITERATION_COMPLETE},
        node::{Node, NodeType},
    },
};

pub use code::CodeExecutor;
pub use conditional::ConditionalExecutor;
pub use database::DatabaseExecutor;
pub use http::HttpExecutor;
pub use input::InputExecutor;
pub use knowledge_base::KnowledgeBaseExecutor;
pub use llm::LlmExecutor;
pub use loop_node::LoopExecutor;
pub use output::OutputExecutor;
pub use switch::SwitchExecutor;
pub use voice::{VoiceListenExecutor, VoiceSpeakExecutor};

/// Runs nodes of one [`NodeType`].
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// The node type this executor handles.
    fn node_type(&self) -> NodeType;

    /// JSON schema of the node's `config`.
    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Executes one attempt of `node`.
    ///
    /// Executors read variables through `ctx` but never write them; variables
    /// to publish go into [`NodeOutput::emitted`].
    async fn execute(
        &self,
        node: &Node,
        ctx: Arc<Context>,
    ) -> Result<NodeOutput, NodeExecutionError>;
}

/// Result of a successful node execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOutput {
    /// recorded on the timeline; branching nodes put their handle here
    pub output: Value,
    /// merged into the variable store by the engine
    pub emitted: Vars,
}

impl NodeOutput {
    pub fn new(
        output: Value,
        emitted: Vars,
    ) -> Self {
        Self {
            output,
            emitted,
        }
    }

    /// Output `value` and emit it as `variable` when one is configured.
    pub fn with_variable(
        variable: Option<&str>,
        value: Value,
    ) -> Self {
        let mut emitted = Vars::new();
        if let Some(name) = variable {
            emitted.insert(name.to_string(), value.clone());
        }
        Self::new(value, emitted)
    }

    pub fn branch_handle(&self) -> Option<&str> {
        self.output.get(BRANCH_HANDLE).and_then(Value::as_str)
    }

    pub fn iteration_complete(&self) -> bool {
        self.output.get(ITERATION_COMPLETE).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn current_item(&self) -> Option<&Value> {
        self.output.get(CURRENT_ITEM)
    }
}

/// Validates `config` against `schema`, then deserializes it.
pub fn parse_config<T: DeserializeOwned>(
    node: &Node,
    schema: &Value,
) -> Result<T, NodeExecutionError> {
    jsonschema::validate(schema, &node.config).map_err(|e| NodeExecutionError::config(format!("invalid config for node {}: {}", node.id, e)))?;
    serde_json::from_value(node.config.clone()).map_err(|e| NodeExecutionError::config(format!("invalid config for node {}: {}", node.id, e)))
}

/// Maps node types to their executors.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut types: Vec<_> = self.executors.keys().map(|t| t.as_ref()).collect();
        types.sort();
        f.debug_struct("NodeRegistry").field("types", &types).finish()
    }
}

impl NodeRegistry {
    pub fn builder() -> NodeRegistryBuilder {
        NodeRegistryBuilder::default()
    }

    /// Every built-in executor whose collaborator is available.
    pub fn with_providers(providers: &Providers) -> Self {
        let mut builder = Self::builder()
            .register(InputExecutor)
            .register(OutputExecutor)
            .register(ConditionalExecutor)
            .register(SwitchExecutor)
            .register(LoopExecutor)
            .register(CodeExecutor)
            .register(HttpExecutor::new(providers.credentials.clone()))
            .register(VoiceListenExecutor);

        if let Some(llm) = &providers.llm {
            builder = builder.register(LlmExecutor::new(llm.clone()));
        }
        if let Some(db) = &providers.database {
            builder = builder.register(DatabaseExecutor::new(db.clone()));
        }
        if let Some(kb) = &providers.knowledge_base {
            builder = builder.register(KnowledgeBaseExecutor::new(kb.clone()));
        }
        if let Some(voice) = &providers.voice {
            builder = builder.register(VoiceSpeakExecutor::new(voice.clone()));
        }
        builder.build()
    }

    pub fn get(
        &self,
        node_type: NodeType,
    ) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&node_type).cloned()
    }

    pub fn contains(
        &self,
        node_type: NodeType,
    ) -> bool {
        self.executors.contains_key(&node_type)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[derive(Default)]
pub struct NodeRegistryBuilder {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl NodeRegistryBuilder {
    /// Registers `executor`, replacing any executor of the same type.
    pub fn register(
        self,
        executor: impl NodeExecutor + 'static,
    ) -> Self {
        self.register_arc(Arc::new(executor))
    }

    pub fn register_arc(
        mut self,
        executor: Arc<dyn NodeExecutor>,
    ) -> Self {
        self.executors.insert(executor.node_type(), executor);
        self
    }

    pub fn build(self) -> NodeRegistry {
        NodeRegistry {
            executors: self.executors,
        }
    }
}
