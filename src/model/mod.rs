mod edge;
mod execution;
mod node;
mod workflow;

pub use edge::EdgeModel;
pub use execution::{Execution, ExecutionId, ExecutionStatus};
pub use node::{ErrorStrategy, NodeModel, OnError, RetryConfig};
pub use workflow::WorkflowModel;
