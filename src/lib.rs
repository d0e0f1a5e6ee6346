//! # Relayflow
//!
//! Relayflow is an event-driven workflow execution engine. A workflow is a graph
//! of typed nodes (LLM calls, branches, loops, scripts, HTTP calls, user input)
//! connected by edges; the engine runs it with per-node retries, error strategies
//! and timeouts, and streams every state change to subscribers.
//!
//! ## Core Features
//!
//! - **Event fan-out**: every execution publishes ordered events on a bus that
//!   subscribers filter by execution and node
//! - **Async Execution**: nodes run on `tokio`, independent branches concurrently
//! - **Error strategies**: `fail`, `continue`, `fallback` and `goto` after retries
//! - **Pluggable collaborators**: LLMs, databases, knowledge bases and voice services
//!   are traits supplied by the embedder
//! - **Gateway**: REST and WebSocket access through `axum`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relayflow::{EngineBuilder, ExecutionStatus, Vars, WorkflowModel};
//!
//! let engine = EngineBuilder::new().providers(providers).build()?;
//! engine.launch()?;
//!
//! let workflow = WorkflowModel::from_json(json_str)?;
//! let id = engine.execute_workflow(&workflow, Vars::new().with("userInput", "hi"))?;
//! let execution = engine.wait_for(&id).await?;
//! assert_eq!(execution.status, ExecutionStatus::Completed);
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
mod gateway;
mod model;
mod runtime;
mod store;
mod utils;
mod workflow;

pub mod events;
pub mod providers;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::Vars;
pub use config::{Config, ExecutionConfig, GatewayConfig, LlmConfig, StoreConfig, StoreType};
pub use engine::Engine;
pub use error::{ErrorKind, FlowError, NodeErrorKind, NodeExecutionError, ValidationError};
pub use gateway::{ClientFrame, GatewayServer, ServerFrame};
pub use model::*;
pub use runtime::{Context, EventBus, EventHandler, SubscribeOptions, SubscriptionHandle};
pub use workflow::{
    Workflow,
    executors::{self, NodeExecutor, NodeOutput, NodeRegistry, NodeRegistryBuilder, parse_config},
    node::{Node, NodeId, NodeType},
    validate,
};

/// Result type alias for Relayflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
