#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use relayflow::{
    Config, Engine, EngineBuilder, Execution, ExecutionConfig, NodeExecutionError, SubscribeOptions, WorkflowModel,
    events::{Envelope, ExecutionEvent},
    providers::{LlmProvider, LlmRequest, LlmResponse, Providers},
};
use serde_json::Value;

/// Answers every prompt with the rendered prompt itself.
pub struct EchoLlm;

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        Ok(LlmResponse {
            content: request.prompt,
            model: Some("echo".to_string()),
        })
    }
}

/// Fails with a retryable provider error `failures` times, then echoes.
pub struct FlakyLlm {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyLlm {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FlakyLlm {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(NodeExecutionError::provider("upstream unavailable", Some(503)));
        }
        EchoLlm.complete(request).await
    }
}

/// Always fails with a non-retryable provider error.
pub struct BrokenLlm;

#[async_trait]
impl LlmProvider for BrokenLlm {
    async fn complete(
        &self,
        _request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        Err(NodeExecutionError::provider("invalid api key", Some(401)))
    }
}

/// Never answers within any sane timeout.
pub struct SlowLlm;

#[async_trait]
impl LlmProvider for SlowLlm {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        EchoLlm.complete(request).await
    }
}

/// Fails when the prompt is `fail`, otherwise sleeps for the number of
/// milliseconds in the prompt and echoes it.
pub struct ScriptedLlm;

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(
        &self,
        request: LlmRequest,
    ) -> Result<LlmResponse, NodeExecutionError> {
        if request.prompt == "fail" {
            return BrokenLlm.complete(request).await;
        }
        let delay = request.prompt.trim().parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        EchoLlm.complete(request).await
    }
}

pub fn config() -> Config {
    Config {
        execution: ExecutionConfig {
            node_timeout_ms: 5_000,
            retry_backoff_ms: 1,
            retry_max_backoff_ms: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn engine(llm: Option<Arc<dyn LlmProvider>>) -> Engine {
    let mut providers = Providers::new();
    if let Some(llm) = llm {
        providers = providers.with_llm(llm);
    }
    let engine = EngineBuilder::new().config(config()).providers(providers).build().unwrap();
    engine.launch().unwrap();
    engine
}

pub fn workflow(value: Value) -> WorkflowModel {
    serde_json::from_value(value).unwrap()
}

/// Records every event published on the engine.
pub fn record(engine: &Engine) -> Arc<Mutex<Vec<Envelope>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.subscribe(SubscribeOptions::default(), move |e| sink.lock().unwrap().push(e.clone())).unwrap();
    events
}

pub fn event_types(
    events: &Arc<Mutex<Vec<Envelope>>>,
    execution_id: &str,
) -> Vec<&'static str> {
    events.lock().unwrap().iter().filter(|e| e.execution_id == execution_id).map(|e| e.event_type()).collect()
}

pub fn has_event(
    events: &Arc<Mutex<Vec<Envelope>>>,
    execution_id: &str,
    pred: impl Fn(&ExecutionEvent) -> bool,
) -> bool {
    events.lock().unwrap().iter().any(|e| e.execution_id == execution_id && pred(&e.event))
}

/// Node ids with a success entry on the timeline, in completion order.
pub fn succeeded(execution: &Execution) -> Vec<String> {
    execution.timeline.iter().filter(|e| e.status == relayflow::events::NodeState::Success).map(|e| e.node_id.clone()).collect()
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
