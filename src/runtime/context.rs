use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::{
    FlowError, Result, ShareLock,
    common::{Shutdown, Vars},
    dispatcher::Signal,
    error::NodeExecutionError,
    events::{ExecutionEvent, LogEntry, NodeState, TimelineEvent},
    model::ExecutionId,
    providers::Providers,
    runtime::EventBus,
    workflow::{
        Workflow,
        consts::ENV_VARIABLE,
        node::{Node, NodeId},
        variables::VariableStore,
    },
};

/// State shared between an execution's dispatcher and its running nodes.
///
/// Executors read variables through it; only the dispatcher writes them.
pub struct Context {
    execution_id: ExecutionId,
    workflow: Arc<Workflow>,
    variables: ShareLock<VariableStore>,
    bus: Arc<EventBus>,
    providers: Providers,
    signals: mpsc::UnboundedSender<Signal>,
    shutdown: Arc<Shutdown>,
    inputs: Mutex<HashMap<NodeId, oneshot::Sender<Value>>>,
    /// completed iterations per loop node since its last completion
    loops: Mutex<HashMap<NodeId, u32>>,
}

impl Context {
    pub(crate) fn new(
        execution_id: &str,
        workflow: Arc<Workflow>,
        bus: Arc<EventBus>,
        providers: Providers,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        let sink = signals.clone();
        let variables = VariableStore::new().with_sink(Arc::new(move |entry| {
            let _ = sink.send(Signal::Log(entry));
        }));
        Self {
            execution_id: execution_id.to_string(),
            workflow,
            variables: Arc::new(RwLock::new(variables)),
            bus,
            providers,
            signals,
            shutdown: Arc::new(Shutdown::new()),
            inputs: Mutex::new(HashMap::new()),
            loops: Mutex::new(HashMap::new()),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<Value> {
        self.variables.read().unwrap_or_else(|e| e.into_inner()).get(name)
    }

    pub fn resolve_template(
        &self,
        template: &str,
    ) -> String {
        self.variables.read().unwrap_or_else(|e| e.into_inner()).resolve_template(template)
    }

    pub fn resolve_value(
        &self,
        template: &str,
    ) -> Value {
        self.variables.read().unwrap_or_else(|e| e.into_inner()).resolve_value(template)
    }

    pub fn resolve_json(
        &self,
        value: &Value,
    ) -> Value {
        self.variables.read().unwrap_or_else(|e| e.into_inner()).resolve_json(value)
    }

    pub fn snapshot(&self) -> Vars {
        self.variables.read().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    /// Seeds the store with the execution inputs and the workflow env map.
    pub(crate) fn seed(
        &self,
        inputs: &Vars,
        env: &HashMap<String, String>,
    ) {
        let mut variables = self.variables.write().unwrap_or_else(|e| e.into_inner());
        variables.set(ENV_VARIABLE, json!(env));
        variables.extend(inputs.clone());
    }

    pub(crate) fn write_variables(
        &self,
        vars: Vars,
    ) {
        self.variables.write().unwrap_or_else(|e| e.into_inner()).extend(vars);
    }

    /// Records a log entry on the execution and publishes it.
    pub fn emit_log(
        &self,
        entry: LogEntry,
    ) {
        self.signal(Signal::Log(entry));
    }

    pub(crate) fn signal(
        &self,
        signal: Signal,
    ) {
        // the receiver is gone once the dispatcher finished
        let _ = self.signals.send(signal);
    }

    pub fn publish(
        &self,
        event: ExecutionEvent,
    ) {
        self.bus.publish(&self.execution_id, event);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_terminated()
    }

    /// Resolves once the execution is cancelled or has failed.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.wait()
    }

    pub(crate) fn cancel(&self) {
        self.shutdown.shutdown();
    }

    /// Completed iterations of `loop_id` since it last finished.
    pub fn loop_index(
        &self,
        loop_id: &str,
    ) -> u32 {
        self.loops.lock().unwrap_or_else(|e| e.into_inner()).get(loop_id).copied().unwrap_or(0)
    }

    pub(crate) fn set_loop_index(
        &self,
        loop_id: &str,
        index: u32,
    ) {
        self.loops.lock().unwrap_or_else(|e| e.into_inner()).insert(loop_id.to_string(), index);
    }

    /// Suspends `node` until [`submit_input`](Self::submit_input) is called for it.
    ///
    /// Publishes `node:waiting` while suspended and `node:started` once resumed.
    /// Aborting the execution fails the wait with `UserAbort`.
    pub async fn wait_for_input(
        &self,
        node: &Node,
        prompt: Option<String>,
    ) -> std::result::Result<Value, NodeExecutionError> {
        let (tx, rx) = oneshot::channel();
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).insert(node.id.clone(), tx);

        debug!(execution_id = %self.execution_id, node_id = %node.id, "waiting for user input");
        let mut waiting = TimelineEvent::new(node, NodeState::Waiting);
        if let Some(prompt) = prompt {
            waiting = waiting.with_output(json!({ "prompt": prompt }));
        }
        self.publish(ExecutionEvent::NodeWaiting(waiting));

        let cancelled = self.cancelled();
        let ret = tokio::select! {
            _ = cancelled => Err(NodeExecutionError::user_abort(format!("execution aborted while node {} was waiting for input", node.id))),
            res = rx => res.map_err(|_| NodeExecutionError::user_abort(format!("input channel of node {} closed", node.id))),
        };
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).remove(&node.id);

        if ret.is_ok() {
            self.publish(ExecutionEvent::NodeStarted(TimelineEvent::new(node, NodeState::Running)));
        }
        ret
    }

    /// Delivers user input to a waiting node.
    ///
    /// Without `node_id` there must be exactly one waiting node.
    pub fn submit_input(
        &self,
        node_id: Option<&str>,
        response: Value,
    ) -> Result<()> {
        let mut inputs = self.inputs.lock().unwrap_or_else(|e| e.into_inner());
        let key = match node_id {
            Some(id) => id.to_string(),
            None => {
                let mut waiting = inputs.keys();
                match (waiting.next(), waiting.next()) {
                    (Some(id), None) => id.clone(),
                    (None, _) => return Err(FlowError::Execution(format!("execution {} has no node waiting for input", self.execution_id))),
                    (Some(_), Some(_)) => {
                        return Err(FlowError::Execution(format!("execution {} has several nodes waiting for input, a node id is required", self.execution_id)));
                    }
                }
            }
        };
        let tx = inputs.remove(&key).ok_or_else(|| FlowError::Execution(format!("node {} of execution {} is not waiting for input", key, self.execution_id)))?;
        tx.send(response).map_err(|_| FlowError::Execution(format!("node {} stopped waiting for input", key)))
    }

    pub fn waiting_nodes(&self) -> Vec<NodeId> {
        self.inputs.lock().unwrap_or_else(|e| e.into_inner()).keys().cloned().collect()
    }
}
