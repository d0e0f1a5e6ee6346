use std::sync::Arc;

use serde_json::Value;

use crate::{
    Result,
    common::{Queue, Shutdown},
    model::ExecutionId,
    runtime::Context,
};

const COMMAND_QUEUE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionCommand {
    Cancel(String),
}

/// Handle on a running execution, kept by the engine until it terminates.
#[derive(Clone)]
pub struct ExecutionHandle {
    id: ExecutionId,
    ctx: Arc<Context>,
    command_queue: Arc<Queue<ExecutionCommand>>,
    done: Arc<Shutdown>,
}

impl ExecutionHandle {
    pub fn new(
        id: &str,
        ctx: Arc<Context>,
    ) -> Self {
        Self {
            id: id.to_string(),
            ctx,
            command_queue: Queue::new(COMMAND_QUEUE_SIZE),
            done: Arc::new(Shutdown::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn command_queue(&self) -> Arc<Queue<ExecutionCommand>> {
        self.command_queue.clone()
    }

    pub(crate) fn done_signal(&self) -> Arc<Shutdown> {
        self.done.clone()
    }

    /// Requests cooperative cancellation.
    pub fn cancel(
        &self,
        reason: &str,
    ) -> Result<()> {
        self.command_queue.send(ExecutionCommand::Cancel(reason.to_string()))
    }

    pub fn submit_input(
        &self,
        node_id: Option<&str>,
        response: Value,
    ) -> Result<()> {
        self.ctx.submit_input(node_id, response)
    }

    pub fn is_done(&self) -> bool {
        self.done.is_terminated()
    }

    /// Resolves once the execution reached a terminal status and was persisted.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        self.done.wait()
    }
}
