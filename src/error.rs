//! Error types for Relayflow.
//!
//! Errors are split by the layer that raises them:
//! - `FlowError` is returned by the public API (submission, store, configuration).
//! - `ValidationError` rejects a workflow definition before any node runs.
//! - `NodeExecutionError` is raised by node executors and fed into the retry and
//!   error-strategy machinery of the dispatcher.
//! - `ErrorKind` is the programmatic tag carried by a failed execution.

use std::string::FromUtf8Error;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::node::NodeId;

/// Unified error type for all Relayflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// The submitted workflow definition is malformed.
    #[error("invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    /// Engine-level errors (startup, shutdown, lifecycle misuse).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Execution lifecycle errors (cancel of a finished run, input to a run that is not waiting).
    #[error("{0}")]
    Execution(String),

    /// A workflow, trigger or execution could not be found.
    #[error("{0} not found")]
    NotFound(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    Io(String),
}

/// Structural problems found in a workflow definition.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum ValidationError {
    #[error("entry point is missing or does not name an existing node")]
    MissingEntryPoint,

    #[error("edge '{0}' references a node that does not exist")]
    DanglingEdge(String),

    #[error("node '{0}' has an unknown type")]
    UnknownNodeType(NodeId),

    #[error("node id '{0}' is defined more than once")]
    DuplicateNode(NodeId),

    #[error("cycle without a loop node: {}", .0.join(" -> "))]
    IllegalCycle(Vec<NodeId>),
}

/// Error categories raised by node executors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display)]
pub enum NodeErrorKind {
    /// Upstream API failure.
    ProviderError,
    /// Malformed node configuration.
    ConfigError,
    /// The node did not finish within its time budget.
    TimeoutError,
    /// The run was aborted while the node was waiting on a user.
    UserAbort,
}

/// Failure of a single node execution attempt.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct NodeExecutionError {
    pub kind: NodeErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl NodeExecutionError {
    pub fn new(
        kind: NodeErrorKind,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    /// Upstream failure. Retryable unless the provider reported a client-side status.
    pub fn provider(
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        let retryable = match status {
            None => true,
            Some(code) => code == 408 || code == 429 || code >= 500,
        };
        Self::new(NodeErrorKind::ProviderError, message, retryable)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::ConfigError, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::TimeoutError, message, true)
    }

    pub fn user_abort(message: impl Into<String>) -> Self {
        Self::new(NodeErrorKind::UserAbort, message, false)
    }
}

/// Kind of the error that terminated an execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display)]
pub enum ErrorKind {
    ProviderError,
    ConfigError,
    TimeoutError,
    UserAbort,
    CycleDetected,
    LoopLimitExceeded,
    UnknownNodeType,
}

impl ErrorKind {
    /// Fatal kinds abort the execution regardless of the node's error strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::CycleDetected | ErrorKind::LoopLimitExceeded | ErrorKind::UnknownNodeType)
    }
}

impl From<NodeErrorKind> for ErrorKind {
    fn from(kind: NodeErrorKind) -> Self {
        match kind {
            NodeErrorKind::ProviderError => ErrorKind::ProviderError,
            NodeErrorKind::ConfigError => ErrorKind::ConfigError,
            NodeErrorKind::TimeoutError => ErrorKind::TimeoutError,
            NodeErrorKind::UserAbort => ErrorKind::UserAbort,
        }
    }
}

impl From<FlowError> for String {
    fn from(val: FlowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowError {
    fn from(error: std::io::Error) -> Self {
        FlowError::Io(error.to_string())
    }
}

impl From<FlowError> for std::io::Error {
    fn from(val: FlowError) -> Self {
        std::io::Error::other(val.to_string())
    }
}

impl From<FromUtf8Error> for FlowError {
    fn from(_: FromUtf8Error) -> Self {
        FlowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(error: toml::de::Error) -> Self {
        FlowError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_retryable_by_status() {
        assert!(NodeExecutionError::provider("connection reset", None).retryable);
        assert!(NodeExecutionError::provider("rate limited", Some(429)).retryable);
        assert!(NodeExecutionError::provider("bad gateway", Some(502)).retryable);
        assert!(!NodeExecutionError::provider("bad request", Some(400)).retryable);
        assert!(!NodeExecutionError::provider("unauthorized", Some(401)).retryable);
    }

    #[test]
    fn test_error_kind_from_node_kind() {
        assert_eq!(ErrorKind::from(NodeErrorKind::TimeoutError), ErrorKind::TimeoutError);
        assert!(!ErrorKind::from(NodeErrorKind::ConfigError).is_fatal());
        assert!(ErrorKind::LoopLimitExceeded.is_fatal());
    }

    #[test]
    fn test_validation_error_message() {
        let err = FlowError::from(ValidationError::IllegalCycle(vec!["a".into(), "b".into(), "a".into()]));
        assert_eq!(err.to_string(), "invalid workflow: cycle without a loop node: a -> b -> a");
    }
}
