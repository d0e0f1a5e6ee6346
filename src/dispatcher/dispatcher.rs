//! Frontier traversal of one execution.
//!
//! The dispatcher is responsible for:
//! - Spawning a task per frontier entry and collecting its completion
//! - Applying outputs, error strategies and loop limits in completion order
//! - Detecting cycles along each traversal path
//! - Persisting the execution record and publishing lifecycle events

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::{Value, json};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, error, info, warn};

use crate::{
    common::{Queue, Shutdown, Vars},
    config::ExecutionConfig,
    dispatcher::{NodeCompletion, NodeFailure, RetryPolicy, Signal},
    error::{ErrorKind, NodeExecutionError},
    events::{ExecutionCancelled, ExecutionCompleted, ExecutionEvent, ExecutionFailed, ExecutionStarted, LogEntry, NodeState, TimelineEvent, VariableUpdate},
    model::{ErrorStrategy, Execution, ExecutionStatus},
    runtime::{Context, ExecutionCommand},
    store::Store,
    utils,
    workflow::{
        Workflow,
        consts::MAX_ITERATIONS,
        executors::{NodeExecutor, NodeOutput, NodeRegistry},
        node::{Node, NodeId, NodeType},
    },
};

/// Drives one execution from `pending` to a terminal status.
pub struct Dispatcher {
    ctx: Arc<Context>,
    workflow: Arc<Workflow>,
    registry: Arc<NodeRegistry>,
    store: Arc<Store>,
    config: ExecutionConfig,
    env: HashMap<String, String>,
    command_queue: Arc<Queue<ExecutionCommand>>,
    runtime: Handle,
    done: Arc<Shutdown>,
}

/// Mutable state of a run, owned by the dispatcher task.
struct RunState {
    exec: Execution,
    in_flight: usize,
    failure: Option<(NodeFailure, Option<NodeId>)>,
    cancel_reason: Option<String>,
}

impl RunState {
    fn is_stopping(&self) -> bool {
        self.failure.is_some() || self.cancel_reason.is_some()
    }
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<Context>,
        workflow: Arc<Workflow>,
        registry: Arc<NodeRegistry>,
        store: Arc<Store>,
        config: ExecutionConfig,
        env: HashMap<String, String>,
        command_queue: Arc<Queue<ExecutionCommand>>,
        runtime: Handle,
        done: Arc<Shutdown>,
    ) -> Self {
        Self {
            ctx,
            workflow,
            registry,
            store,
            config,
            env,
            command_queue,
            runtime,
            done,
        }
    }

    /// Spawns the dispatcher task.
    pub fn start(
        self,
        exec: Execution,
        signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        let runtime = self.runtime.clone();
        runtime.spawn(self.run(exec, signals));
    }

    async fn run(
        self,
        mut exec: Execution,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        info!(execution_id = %exec.id, workflow_id = %exec.workflow_id, "execution started");
        debug!("{}", self.workflow.schema());

        self.ctx.seed(&exec.inputs, &self.env);
        exec.status = ExecutionStatus::Running;
        exec.variables = self.ctx.snapshot();
        self.persist(&exec);
        self.ctx.publish(ExecutionEvent::Started(ExecutionStarted {
            workflow_id: exec.workflow_id.clone(),
            workflow_name: exec.workflow_name.clone(),
            inputs: exec.inputs.clone(),
        }));

        let mut state = RunState {
            exec,
            in_flight: 0,
            failure: None,
            cancel_reason: None,
        };
        self.schedule(&mut state, self.workflow.entry_point().clone(), Vec::new());

        while state.in_flight > 0 {
            tokio::select! {
                Some(cmd) = self.command_queue.next_async() => self.handle_command(&mut state, cmd),
                Some(signal) = signals.recv() => match signal {
                    Signal::Log(entry) => self.record_log(&mut state.exec, entry),
                    Signal::Done(completion) => {
                        state.in_flight -= 1;
                        self.complete(&mut state, completion);
                    }
                },
                else => break,
            }
        }

        while let Ok(signal) = signals.try_recv() {
            if let Signal::Log(entry) = signal {
                self.record_log(&mut state.exec, entry);
            }
        }

        self.finish(state);
    }

    fn handle_command(
        &self,
        state: &mut RunState,
        cmd: ExecutionCommand,
    ) {
        match cmd {
            ExecutionCommand::Cancel(reason) => {
                if state.is_stopping() {
                    return;
                }
                info!(execution_id = %state.exec.id, in_flight = state.in_flight, "cancelling execution");
                state.cancel_reason = Some(reason);
                self.ctx.cancel();
            }
        }
    }

    /// Adds `node_id` to the frontier, reached along `path`.
    fn schedule(
        &self,
        state: &mut RunState,
        node_id: NodeId,
        mut path: Vec<NodeId>,
    ) {
        if state.is_stopping() {
            return;
        }
        let Some(node) = self.workflow.get_node(&node_id).cloned() else {
            self.fail(state, NodeFailure::new(ErrorKind::ConfigError, format!("node {} not found", node_id)), Some(node_id));
            return;
        };

        if let Some(pos) = path.iter().position(|n| n == &node_id) {
            if node.node_type == NodeType::Loop {
                path.truncate(pos);
            } else {
                let mut cycle = path[pos..].to_vec();
                cycle.push(node_id.clone());
                let failure = NodeFailure::new(ErrorKind::CycleDetected, format!("node {} revisited along path {}", node_id, cycle.join(" -> ")));
                self.fail(state, failure, Some(node_id));
                return;
            }
        }
        path.push(node_id.clone());

        debug!(execution_id = %state.exec.id, node_id = %node.id, node_type = %node.node_type, "scheduling node");
        state.exec.current_node_id = Some(node_id);
        state.in_flight += 1;
        self.ctx.publish(ExecutionEvent::NodeStarted(TimelineEvent::new(&node, NodeState::Running)));

        let task = NodeTask {
            ctx: self.ctx.clone(),
            executor: self.registry.get(node.node_type),
            policy: RetryPolicy::for_node(&node, &self.config),
            timeout: node.timeout.or_else(|| (!node.node_type.awaits_input()).then(|| Duration::from_millis(self.config.node_timeout_ms))),
            node,
        };
        self.runtime.spawn(task.run(path));
    }

    fn complete(
        &self,
        state: &mut RunState,
        completion: NodeCompletion,
    ) {
        let NodeCompletion {
            node_id,
            path,
            attempts,
            started_at,
            result,
        } = completion;

        if state.is_stopping() {
            debug!(execution_id = %state.exec.id, node_id = %node_id, "discarding result of stopped execution");
            return;
        }
        let Some(node) = self.workflow.get_node(&node_id).cloned() else {
            return;
        };

        let finished = Finished {
            node: &node,
            path,
            attempts,
            started_at,
        };
        match result {
            Ok(output) => self.succeed(state, &finished, output),
            Err(failure) => self.recover(state, &finished, failure),
        }
        self.persist(&state.exec);
    }

    fn succeed(
        &self,
        state: &mut RunState,
        finished: &Finished<'_>,
        output: NodeOutput,
    ) {
        let node = finished.node;
        if node.node_type == NodeType::Loop && !self.count_iteration(state, finished, &output) {
            return;
        }

        self.merge_variables(state, output.emitted.clone());
        if node.node_type == NodeType::Output {
            if let Value::Object(map) = &output.output {
                for (k, v) in map {
                    state.exec.outputs.insert(k.clone(), v.clone());
                }
            }
        }

        let event = TimelineEvent::new(node, NodeState::Success)
            .with_duration(finished.started_at)
            .with_output(output.output.clone())
            .with_attempts(finished.attempts);
        self.record_timeline(state, event);

        for next in self.workflow.resolve_next(&node.id, output.branch_handle()) {
            self.schedule(state, next, finished.path.clone());
        }
    }

    /// Returns false when the loop ran out of iterations.
    fn count_iteration(
        &self,
        state: &mut RunState,
        finished: &Finished<'_>,
        output: &NodeOutput,
    ) -> bool {
        let node = finished.node;
        if output.iteration_complete() {
            self.ctx.set_loop_index(&node.id, 0);
            return true;
        }

        let completed = self.ctx.loop_index(&node.id);
        let limit = node
            .config
            .get(MAX_ITERATIONS)
            .and_then(Value::as_u64)
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(self.config.max_loop_iterations);
        if completed >= limit {
            let failure = NodeFailure::new(ErrorKind::LoopLimitExceeded, format!("loop {} exceeded {} iterations", node.id, limit));
            self.record_error(state, finished, &failure);
            self.fail(state, failure, Some(node.id.clone()));
            return false;
        }
        self.ctx.set_loop_index(&node.id, completed + 1);
        true
    }

    /// Applies the node's error strategy to a failure that survived its retries.
    fn recover(
        &self,
        state: &mut RunState,
        finished: &Finished<'_>,
        failure: NodeFailure,
    ) {
        let node = finished.node;
        let strategy = if failure.kind.is_fatal() { ErrorStrategy::Fail } else { node.on_error.strategy };
        warn!(
            execution_id = %state.exec.id,
            node_id = %node.id,
            kind = %failure.kind,
            strategy = strategy.as_ref(),
            "node failed: {}", failure.message
        );

        match strategy {
            ErrorStrategy::Continue => {
                let entry = LogEntry::warn(format!("node {} failed, continuing: {}", node.display_name(), failure.message)).with_node(&node.id, &node.name);
                self.record_log(&mut state.exec, entry);
                self.succeed(state, finished, NodeOutput::new(json!({}), Vars::new()));
            }
            ErrorStrategy::Fallback => {
                let entry = LogEntry::warn(format!("node {} failed, using fallback value: {}", node.display_name(), failure.message)).with_node(&node.id, &node.name);
                self.record_log(&mut state.exec, entry);
                let value = node.on_error.fallback_value.clone().unwrap_or(Value::Null);
                self.succeed(state, finished, NodeOutput::with_variable(node.output_variable(), value));
            }
            ErrorStrategy::Goto => {
                self.record_error(state, finished, &failure);
                match node.on_error.goto_node.as_deref().filter(|id| self.workflow.get_node(id).is_some()) {
                    Some(target) => {
                        let entry = LogEntry::warn(format!("node {} failed, jumping to {}: {}", node.display_name(), target, failure.message)).with_node(&node.id, &node.name);
                        self.record_log(&mut state.exec, entry);
                        self.schedule(state, target.to_string(), finished.path.clone());
                    }
                    None => {
                        let missing = NodeFailure::new(ErrorKind::ConfigError, format!("goto target {:?} of node {} does not exist", node.on_error.goto_node, node.id));
                        self.fail(state, missing, Some(node.id.clone()));
                    }
                }
            }
            ErrorStrategy::Fail => {
                self.record_error(state, finished, &failure);
                self.fail(state, failure, Some(node.id.clone()));
            }
        }
    }

    fn fail(
        &self,
        state: &mut RunState,
        failure: NodeFailure,
        node_id: Option<NodeId>,
    ) {
        if state.failure.is_none() {
            error!(execution_id = %state.exec.id, node_id = ?node_id, kind = %failure.kind, "execution failed: {}", failure.message);
            let entry = LogEntry::error(failure.message.clone());
            let entry = match node_id.as_deref().and_then(|id| self.workflow.get_node(id)) {
                Some(node) => entry.with_node(&node.id, &node.name),
                None => entry,
            };
            self.record_log(&mut state.exec, entry);
            state.failure = Some((failure, node_id));
        }
        self.ctx.cancel();
    }

    fn merge_variables(
        &self,
        state: &mut RunState,
        vars: Vars,
    ) {
        if vars.is_empty() {
            return;
        }
        self.ctx.write_variables(vars.clone());
        for (name, value) in vars.iter() {
            self.ctx.publish(ExecutionEvent::VariableUpdated(VariableUpdate {
                name: name.clone(),
                value: value.clone(),
            }));
        }
        state.exec.variables = self.ctx.snapshot();
    }

    fn record_error(
        &self,
        state: &mut RunState,
        finished: &Finished<'_>,
        failure: &NodeFailure,
    ) {
        let event = TimelineEvent::new(finished.node, NodeState::Error)
            .with_duration(finished.started_at)
            .with_error(failure.kind, &failure.message)
            .with_attempts(finished.attempts);
        self.record_timeline(state, event);
    }

    fn record_timeline(
        &self,
        state: &mut RunState,
        event: TimelineEvent,
    ) {
        state.exec.timeline.push(event.clone());
        self.ctx.publish(ExecutionEvent::NodeCompleted(event));
    }

    fn record_log(
        &self,
        exec: &mut Execution,
        entry: LogEntry,
    ) {
        exec.logs.push(entry.clone());
        self.ctx.publish(ExecutionEvent::Log(entry));
    }

    fn persist(
        &self,
        exec: &Execution,
    ) {
        if let Err(err) = self.store.save_execution(exec) {
            error!(execution_id = %exec.id, "failed to persist execution: {}", err);
        }
    }

    fn finish(
        &self,
        state: RunState,
    ) {
        let RunState {
            mut exec,
            failure,
            cancel_reason,
            ..
        } = state;

        let completed_at = utils::time::now();
        exec.completed_at = Some(completed_at);
        exec.variables = self.ctx.snapshot();

        let event = if let Some((failure, node_id)) = failure {
            exec.status = ExecutionStatus::Failed;
            exec.error = Some(failure.message.clone());
            exec.error_kind = Some(failure.kind);
            ExecutionEvent::Failed(ExecutionFailed {
                error: failure.message,
                error_kind: failure.kind,
                node_id,
            })
        } else if let Some(reason) = cancel_reason {
            exec.status = ExecutionStatus::Cancelled;
            ExecutionEvent::Cancelled(ExecutionCancelled {
                reason,
            })
        } else {
            exec.status = ExecutionStatus::Completed;
            ExecutionEvent::Completed(ExecutionCompleted {
                outputs: exec.outputs.clone(),
                duration_ms: utils::time::elapsed_millis(exec.started_at, completed_at),
            })
        };

        info!(execution_id = %exec.id, status = %exec.status, timeline = exec.timeline.len(), "execution finished");
        self.persist(&exec);
        self.ctx.publish(event);
        self.done.shutdown();
    }
}

/// A node whose task has reported back.
struct Finished<'a> {
    node: &'a Node,
    path: Vec<NodeId>,
    attempts: u32,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// One frontier entry running on its own task.
struct NodeTask {
    ctx: Arc<Context>,
    executor: Option<Arc<dyn NodeExecutor>>,
    node: Node,
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl NodeTask {
    async fn run(
        self,
        path: Vec<NodeId>,
    ) {
        let started_at = utils::time::now();
        let (result, attempts) = match self.executor.clone() {
            Some(executor) => self.attempt(executor).await,
            None => {
                let message = format!("no executor registered for node type {} (node {})", self.node.node_type, self.node.id);
                (Err(NodeFailure::new(ErrorKind::UnknownNodeType, message)), 0)
            }
        };

        self.ctx.signal(Signal::Done(NodeCompletion {
            node_id: self.node.id.clone(),
            path,
            attempts,
            started_at,
            result,
        }));
    }

    /// Runs the executor until it succeeds, fails for good or the execution stops.
    async fn attempt(
        &self,
        executor: Arc<dyn NodeExecutor>,
    ) -> (Result<NodeOutput, NodeFailure>, u32) {
        let node = &self.node;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(execution_id = %self.ctx.execution_id(), node_id = %node.id, attempt, "executing node");

            let fut = executor.execute(node, self.ctx.clone());
            let ret = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(ret) => ret,
                    Err(_) => Err(NodeExecutionError::timeout(format!("node {} timed out after {}ms", node.id, limit.as_millis()))),
                },
                None => fut.await,
            };

            let err = match ret {
                Ok(output) => return (Ok(output), attempt),
                Err(err) => err,
            };

            let retried = attempt - 1;
            if !err.retryable || retried >= self.policy.max_retries || self.ctx.is_cancelled() {
                return (Err(err.into()), attempt);
            }

            let delay = self.policy.delay(retried);
            let delay_ms = delay.as_millis() as u64;
            warn!(execution_id = %self.ctx.execution_id(), node_id = %node.id, attempt, delay_ms, "retrying node: {}", err);
            self.ctx.emit_log(
                LogEntry::warn(format!("node:retrying {} in {}ms after attempt {}: {}", node.display_name(), delay_ms, attempt, err.message))
                    .with_node(&node.id, &node.name)
                    .with_metadata(json!({
                        "event": "node:retrying",
                        "attempt": attempt,
                        "delayMs": delay_ms,
                        "errorKind": err.kind,
                    })),
            );

            tokio::select! {
                _ = self.ctx.cancelled() => return (Err(err.into()), attempt),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
