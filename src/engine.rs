//! Workflow engine - the main entry point of relayflow.
//!
//! The engine owns everything executions share:
//! - The event bus and the monitor recording event history
//! - The store of workflows, triggers and execution records
//! - The node registry and provider collaborators
//! - The cache of running executions

mod monitor;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tokio::{
    runtime::{Handle, Runtime},
    sync::mpsc,
};
use tracing::{info, warn};

use crate::{
    Config, FlowError, Result, StoreType,
    common::{MemCache, Shutdown, Vars},
    dispatcher::Dispatcher,
    error::ValidationError,
    events::Envelope,
    model::{Execution, ExecutionId, ExecutionStatus, WorkflowModel},
    providers::Providers,
    runtime::{Context, EventBus, ExecutionHandle, SubscribeOptions, SubscriptionHandle},
    store::{DbStore, MemStore, Store},
    workflow::{Workflow, executors::NodeRegistry},
};

use monitor::Monitor;

/// The workflow engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().providers(providers).build()?;
/// engine.launch();
///
/// let id = engine.execute_workflow(&workflow, Vars::new().with("userInput", "hi"))?;
/// let execution = engine.wait_for(&id).await?;
/// assert_eq!(execution.status, ExecutionStatus::Completed);
///
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Config,
    bus: Arc<EventBus>,
    store: Arc<Store>,
    monitor: Monitor,
    registry: Arc<NodeRegistry>,
    providers: Providers,
    /// running executions, removed once terminal; never evicted
    executions: Arc<MemCache<ExecutionId, ExecutionHandle>>,

    running: Arc<AtomicBool>,
    runtime: Handle,
    _owned_runtime: Option<Arc<Runtime>>,
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        registry: NodeRegistry,
        providers: Providers,
        runtime: Handle,
        owned_runtime: Option<Arc<Runtime>>,
    ) -> Result<Self> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
        };
        db.init(&store)?;

        let store = Arc::new(store);
        let bus = Arc::new(EventBus::new());
        let monitor = Monitor::new(store.clone(), bus.clone(), config.execution.history_retention);
        let executions = Arc::new(MemCache::new());

        Ok(Self {
            config,
            bus,
            store,
            monitor,
            registry: Arc::new(registry),
            providers,
            executions,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            _owned_runtime: owned_runtime,
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    /// Starts recording event history and accepting executions.
    pub fn launch(&self) -> Result<()> {
        if self.running.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        self.monitor.monitor()?;
        info!(node_types = self.registry.len(), "engine launched");
        Ok(())
    }

    /// Cancels every running execution and stops recording history.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        for (_, handle) in self.executions.iter() {
            if let Err(err) = handle.cancel("engine shutdown") {
                warn!(execution_id = %handle.id(), "failed to cancel execution: {}", err);
            }
        }
        self.monitor.stop();
        info!("engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Resolves once [`shutdown`](Self::shutdown) was called.
    pub fn wait_shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.wait()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    /// Structural validation plus the illegal-cycle check.
    pub fn validate(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<Arc<Workflow>> {
        let workflow = Workflow::try_from(workflow)?;
        if let Some(cycle) = workflow.find_illegal_cycle() {
            return Err(ValidationError::IllegalCycle(cycle).into());
        }
        Ok(Arc::new(workflow))
    }

    /// Stores a validated workflow under its id.
    pub fn deploy(
        &self,
        workflow: &WorkflowModel,
    ) -> Result<bool> {
        self.validate(workflow)?;
        self.store.deploy(workflow)
    }

    /// Binds `trigger_id` to a deployed workflow.
    pub fn register_trigger(
        &self,
        trigger_id: &str,
        workflow_id: &str,
    ) -> Result<bool> {
        if !self.store.workflows()?.exists(workflow_id)? {
            return Err(FlowError::NotFound(format!("workflow {}", workflow_id)));
        }
        self.store.bind_trigger(trigger_id, workflow_id)
    }

    /// Starts an execution of `workflow` and returns its id without waiting for it.
    pub fn execute_workflow(
        &self,
        workflow: &WorkflowModel,
        inputs: Vars,
    ) -> Result<ExecutionId> {
        if !self.is_running() {
            return Err(FlowError::Engine("engine is not running".to_string()));
        }
        let graph = self.validate(workflow)?;
        let limit = self.config.execution.max_running_executions;
        if self.executions.len() >= limit {
            return Err(FlowError::Engine(format!("{} executions are already running", limit)));
        }

        let exec = Execution::new(&workflow.id, &workflow.name, inputs);
        let execution_id = exec.id.clone();
        self.store.save_execution(&exec)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(Context::new(&execution_id, graph.clone(), self.bus.clone(), self.providers.clone(), tx));
        let handle = ExecutionHandle::new(&execution_id, ctx.clone());
        self.executions.set(execution_id.clone(), handle.clone());

        let executions = self.executions.clone();
        let done = handle.wait();
        let id = execution_id.clone();
        self.runtime.spawn(async move {
            done.await;
            executions.remove(&id);
        });

        Dispatcher::new(
            ctx,
            graph,
            self.registry.clone(),
            self.store.clone(),
            self.config.execution.clone(),
            workflow.env.clone(),
            handle.command_queue(),
            self.runtime.clone(),
            handle.done_signal(),
        )
        .start(exec, rx);

        Ok(execution_id)
    }

    /// Starts an execution of the workflow bound to `trigger_id`.
    pub fn execute_trigger(
        &self,
        trigger_id: &str,
        inputs: Vars,
    ) -> Result<(ExecutionId, ExecutionStatus)> {
        let trigger = self.store.triggers()?.find(trigger_id)?;
        let workflow = self.store.load_workflow(&trigger.workflow_id)?;
        let execution_id = self.execute_workflow(&workflow, inputs)?;
        let status = self.store.load_execution(&execution_id)?.status;
        Ok((execution_id, status))
    }

    pub fn subscribe(
        &self,
        options: SubscribeOptions,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        self.bus.subscribe(options, handler)
    }

    pub fn unsubscribe(
        &self,
        handle: SubscriptionHandle,
    ) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// Resumes a node waiting for user input.
    pub fn submit_user_input(
        &self,
        execution_id: &str,
        response: Value,
        node_id: Option<&str>,
    ) -> Result<()> {
        self.running_execution(execution_id)?.submit_input(node_id, response)
    }

    /// Requests cancellation of a running execution.
    pub fn cancel(
        &self,
        execution_id: &str,
    ) -> Result<()> {
        self.running_execution(execution_id)?.cancel("cancelled by user")
    }

    /// The latest persisted state of an execution.
    pub fn get_execution(
        &self,
        execution_id: &str,
    ) -> Result<Execution> {
        self.store.load_execution(execution_id)
    }

    /// Events published for an execution since the engine launched, in publish order.
    pub fn execution_history(
        &self,
        execution_id: &str,
    ) -> Result<Vec<Envelope>> {
        self.store.executions()?.find(execution_id)?;
        self.store.history(execution_id)
    }

    /// Waits until the execution is terminal and returns its final state.
    pub async fn wait_for(
        &self,
        execution_id: &str,
    ) -> Result<Execution> {
        if let Some(handle) = self.executions.get(&execution_id.to_string()) {
            handle.wait().await;
        }
        self.store.load_execution(execution_id)
    }

    pub fn running_executions(&self) -> Vec<ExecutionId> {
        self.executions.iter().filter(|(_, h)| !h.is_done()).map(|(id, _)| id.as_ref().clone()).collect()
    }

    fn running_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionHandle> {
        if let Some(handle) = self.executions.get(&execution_id.to_string()) {
            if !handle.is_done() {
                return Ok(handle);
            }
        }
        let exec = self.store.load_execution(execution_id)?;
        Err(FlowError::Execution(format!("execution {} is not running (status {})", execution_id, exec.status)))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
